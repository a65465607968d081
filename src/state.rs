//! Instrument state store.
//!
//! [`InstrumentState`] is the single source of truth for everything the
//! control plane has configured. It lives inside
//! [`Instrument`](crate::instrument::Instrument) behind the instrument lock;
//! nothing here talks to hardware.

use crate::addressing::ChannelKey;
use crate::hardware::{
    BandwidthLimit, Coupling, EdgeDirection, Hysteresis, WaveShape, LANES_PER_POD,
};
use chrono::{DateTime, Utc};

/// Memory depth before any `DEPTH` command.
pub const DEFAULT_DEPTH: u64 = 1_000_000;

/// Requested range before any `RANGE` command, volts.
pub const DEFAULT_RANGE: f64 = 1.0;

/// Generator frequency before any `AWG:FREQ` command, Hz.
pub const DEFAULT_GENERATOR_FREQUENCY: f64 = 1000.0;

/// One analog input.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    pub enabled: bool,
    pub coupling: Coupling,
    /// Range as requested by the client, volts
    pub requested_range: f64,
    /// Ladder value actually programmed, volts
    pub rounded_range: f64,
    /// Offset after clamping to hardware limits, volts
    pub offset: f64,
    pub bandwidth: BandwidthLimit,
}

impl ChannelState {
    fn new(rounded_range: f64) -> Self {
        Self {
            enabled: false,
            coupling: Coupling::default(),
            requested_range: DEFAULT_RANGE,
            rounded_range,
            offset: 0.0,
            bandwidth: BandwidthLimit::Full,
        }
    }
}

/// One MSO pod.
#[derive(Debug, Clone, PartialEq)]
pub struct PodState {
    pub enabled: bool,
    /// Hardware threshold code per lane
    pub thresholds: [i16; LANES_PER_POD],
    pub hysteresis: Hysteresis,
    /// Last threshold set for the pod, volts
    pub threshold_volts: f64,
}

impl Default for PodState {
    fn default() -> Self {
        Self {
            enabled: false,
            thresholds: [0; LANES_PER_POD],
            hysteresis: Hysteresis::default(),
            threshold_volts: 0.0,
        }
    }
}

/// The one trigger of the instrument, plus arm state.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerState {
    pub source: ChannelKey,
    pub direction: EdgeDirection,
    /// Level in volts
    pub level: f64,
    /// Delay in femtoseconds; positive values move the trigger point into the
    /// record (pre-trigger), negative values delay capture after the trigger
    pub delay_fs: i64,
    pub armed: bool,
    pub one_shot: bool,
    /// Last arm was a forced (auto) trigger
    pub last_forced: bool,
    /// Auto-trigger timeout pushed with the trigger, µs (0 waits forever)
    pub timeout_us: u32,
}

impl Default for TriggerState {
    fn default() -> Self {
        Self {
            source: ChannelKey::Analog(0),
            direction: EdgeDirection::Rising,
            level: 0.0,
            delay_fs: 0,
            armed: false,
            one_shot: false,
            last_forced: false,
            timeout_us: 0,
        }
    }
}

/// Function generator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorState {
    pub enabled: bool,
    pub shape: WaveShape,
    /// Output frequency, Hz, never zero
    pub frequency_hz: f64,
    /// Duty cycle, percent
    pub duty_percent: f64,
    /// Peak-to-peak amplitude, volts
    pub range: f64,
    /// DC offset, volts
    pub offset: f64,
    /// Arbitrary waveform buffer, fixed length per model
    pub arbitrary: Vec<i16>,
}

impl GeneratorState {
    fn new(buffer_len: usize) -> Self {
        Self {
            enabled: false,
            shape: WaveShape::Sine,
            frequency_hz: DEFAULT_GENERATOR_FREQUENCY,
            duty_percent: 50.0,
            range: 0.0,
            offset: 0.0,
            arbitrary: vec![0; buffer_len],
        }
    }
}

/// Sample rate and memory depth.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTiming {
    /// Sample interval in femtoseconds, 0 until a rate is set
    pub interval_fs: u64,
    /// Hardware timebase index for `interval_fs`
    pub timebase: u32,
    /// Memory depth in samples
    pub depth: u64,
    /// Buffers downstream must be reallocated
    pub depth_changed: bool,
    /// ADC resolution in bits
    pub resolution_bits: u8,
}

/// Configuration frozen at arm time for the data plane.
///
/// Immutable until the next arm replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmSnapshot {
    pub captured_at: DateTime<Utc>,
    pub channel_enabled: Vec<bool>,
    pub channel_offsets: Vec<f64>,
    pub pod_enabled: Vec<bool>,
    pub interval_fs: u64,
    pub depth: u64,
    /// Index of the trigger sample within the record
    pub trigger_sample: u64,
    /// Depth differs from the previous capture
    pub depth_changed: bool,
}

/// Everything the bridge has configured on the instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentState {
    pub channels: Vec<ChannelState>,
    pub pods: Vec<PodState>,
    pub trigger: TriggerState,
    pub generator: GeneratorState,
    pub timing: SampleTiming,
    /// ADC code of positive full scale at the current resolution
    pub adc_full_scale: i16,
    pub snapshot: Option<ArmSnapshot>,
}

impl InstrumentState {
    /// Fresh state: everything disabled and disarmed.
    pub fn new(
        analog_channels: usize,
        digital_pods: usize,
        default_rounded_range: f64,
        generator_buffer_len: usize,
        resolution_bits: u8,
    ) -> Self {
        Self {
            channels: vec![ChannelState::new(default_rounded_range); analog_channels],
            pods: vec![PodState::default(); digital_pods],
            trigger: TriggerState::default(),
            generator: GeneratorState::new(generator_buffer_len),
            timing: SampleTiming {
                interval_fs: 0,
                timebase: 0,
                depth: DEFAULT_DEPTH,
                depth_changed: false,
                resolution_bits,
            },
            adc_full_scale: 32512,
            snapshot: None,
        }
    }

    /// At least one analog channel or pod is enabled.
    pub fn any_source_enabled(&self) -> bool {
        self.channels.iter().any(|c| c.enabled) || self.pods.iter().any(|p| p.enabled)
    }

    /// Whether a key addresses an enabled input (the auxiliary input always is).
    pub fn is_enabled(&self, key: ChannelKey) -> bool {
        match key {
            ChannelKey::Analog(index) => self.channels.get(index).is_some_and(|c| c.enabled),
            ChannelKey::Digital { pod, .. } => self.pods.get(pod).is_some_and(|p| p.enabled),
            ChannelKey::Auxiliary => true,
        }
    }

    /// Rounded range and offset used to convert a trigger level into a code.
    ///
    /// The auxiliary input has a fixed ±1 V window.
    pub fn trigger_frontend(&self, key: ChannelKey) -> Option<(f64, f64)> {
        match key {
            ChannelKey::Analog(index) => self
                .channels
                .get(index)
                .map(|c| (c.rounded_range, c.offset)),
            ChannelKey::Auxiliary => Some((2.0, 0.0)),
            ChannelKey::Digital { .. } => None,
        }
    }

    /// Freeze the current configuration for the data plane.
    ///
    /// Consumes the `depth_changed` flag into the snapshot.
    pub fn take_arm_snapshot(&mut self, trigger_sample: u64) -> &ArmSnapshot {
        let depth_changed = self.timing.depth_changed
            || self
                .snapshot
                .as_ref()
                .map_or(true, |s| s.depth != self.timing.depth);
        self.timing.depth_changed = false;

        self.snapshot.insert(ArmSnapshot {
            captured_at: Utc::now(),
            channel_enabled: self.channels.iter().map(|c| c.enabled).collect(),
            channel_offsets: self.channels.iter().map(|c| c.offset).collect(),
            pod_enabled: self.pods.iter().map(|p| p.enabled).collect(),
            interval_fs: self.timing.interval_fs,
            depth: self.timing.depth,
            trigger_sample,
            depth_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> InstrumentState {
        InstrumentState::new(4, 2, 1.0, 16, 8)
    }

    #[test]
    fn starts_disabled_and_disarmed() {
        let state = state();
        assert!(!state.any_source_enabled());
        assert!(!state.trigger.armed);
        assert_eq!(state.generator.arbitrary.len(), 16);
        assert_eq!(state.timing.depth, DEFAULT_DEPTH);
        assert!(state.is_enabled(ChannelKey::Auxiliary));
    }

    #[test]
    fn snapshot_is_independent_of_later_changes() {
        let mut state = state();
        state.channels[1].enabled = true;
        state.channels[1].offset = 0.25;
        state.take_arm_snapshot(10);

        state.channels[1].offset = -1.0;
        state.channels[2].enabled = true;

        let snapshot = state.snapshot.as_ref().unwrap();
        assert_eq!(snapshot.channel_enabled, vec![false, true, false, false]);
        assert_eq!(snapshot.channel_offsets[1], 0.25);
        assert_eq!(snapshot.trigger_sample, 10);
    }

    #[test]
    fn depth_change_flag_is_consumed_by_snapshot() {
        let mut state = state();
        assert!(state.take_arm_snapshot(0).depth_changed);
        assert!(!state.take_arm_snapshot(0).depth_changed);

        state.timing.depth = 5000;
        assert!(state.take_arm_snapshot(0).depth_changed);

        state.timing.depth_changed = true;
        assert!(state.take_arm_snapshot(0).depth_changed);
        assert!(!state.timing.depth_changed);
    }

    #[test]
    fn auxiliary_trigger_uses_fixed_window() {
        let state = state();
        assert_eq!(state.trigger_frontend(ChannelKey::Auxiliary), Some((2.0, 0.0)));
        assert_eq!(
            state.trigger_frontend(ChannelKey::Digital { pod: 0, lane: 1 }),
            None
        );
    }
}
