//! The instrument: one capability-layer handle plus the state store.
//!
//! Every operation here mutates [`InstrumentState`] and pushes the affected
//! configuration to hardware. Callers hold the instrument lock
//! ([`SharedInstrument`]) for the whole operation, so hardware calls from the
//! control and data planes never interleave.
//!
//! Trigger and acquisition transitions live in [`crate::capture`], function
//! generator handling in [`crate::generator`]; both extend `Instrument`.
//!
//! Hard hardware failures are logged with their numeric code and the state
//! keeps the requested value. A pod that fails to switch on stays disabled.

use crate::addressing::ChannelKey;
use crate::error::HardwareResult;
use crate::hardware::{
    AnalogSetup, BandwidthLimit, Coupling, Hysteresis, Identity, ScopeDriver,
};
use crate::quantize::{self, clamp_offset, interval_fs_for_rate, quantize_range, FS_PER_SECOND};
use crate::state::{InstrumentState, DEFAULT_RANGE};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Instrument shared between the control and data planes.
pub type SharedInstrument = Arc<Mutex<Instrument>>;

/// Log a failed hardware call and turn the result into an `Option`.
pub(crate) fn logged<T>(operation: &'static str, result: HardwareResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(operation, code = err.code(), error = %err, "hardware call failed");
            None
        }
    }
}

/// Oscilloscope state and the driver that realizes it.
pub struct Instrument {
    pub(crate) driver: Box<dyn ScopeDriver>,
    pub(crate) state: InstrumentState,
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("identity", self.driver.identity())
            .field("state", &self.state)
            .finish()
    }
}

impl Instrument {
    /// Wrap a driver with a fresh, fully disabled state.
    pub fn new(mut driver: Box<dyn ScopeDriver>) -> Self {
        let family = driver.family();
        let rounded = quantize_range(family.range_ladder(), DEFAULT_RANGE, Coupling::Dc1M);
        let bits = family.resolutions().first().copied().unwrap_or(8);
        let buffer_len = family.generator_buffer_len();

        let mut state = InstrumentState::new(
            driver.analog_channel_count(),
            driver.digital_pod_count(),
            rounded,
            buffer_len,
            bits,
        );
        if let Some(code) = logged("adc_full_scale_code", driver.adc_full_scale_code()) {
            state.adc_full_scale = code;
        }

        info!(
            identity = %driver.identity(),
            family = driver.family().name(),
            channels = state.channels.len(),
            pods = state.pods.len(),
            "instrument ready"
        );
        Self { driver, state }
    }

    /// Put the instrument behind the shared lock.
    pub fn into_shared(self) -> SharedInstrument {
        Arc::new(Mutex::new(self))
    }

    /// Current configuration.
    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    /// Identification reported by `*IDN?`.
    pub fn identity(&self) -> &Identity {
        self.driver.identity()
    }

    /// Analog channel count.
    pub fn analog_channel_count(&self) -> usize {
        self.state.channels.len()
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Switch an analog channel or a digital pod on or off.
    ///
    /// Returns `false` for addresses that cannot be switched (auxiliary input,
    /// out-of-range pod).
    pub fn set_channel_enabled(&mut self, key: ChannelKey, enabled: bool) -> bool {
        match key {
            ChannelKey::Analog(index) => {
                let Some(channel) = self.state.channels.get_mut(index) else {
                    return false;
                };
                channel.enabled = enabled;
                // the trigger is re-pushed once below
                self.push_frontend(index);
            }
            ChannelKey::Digital { pod, .. } => {
                if pod >= self.state.pods.len() {
                    debug!(pod, "no such pod");
                    return false;
                }
                self.set_pod_enabled(pod, enabled);
            }
            ChannelKey::Auxiliary => return false,
        }

        // buffers downstream depend on the channel set
        self.state.timing.depth_changed = true;
        self.update_trigger(false);
        true
    }

    /// Select input coupling. 50 Ω is refused on families without it.
    pub fn set_coupling(&mut self, index: usize, coupling: Coupling) {
        if coupling.is_fifty_ohm() && !self.driver.family().supports_fifty_ohm() {
            warn!(channel = index, "50 ohm termination not available on this instrument");
            return;
        }
        let ladder = self.driver.family().range_ladder();
        let Some(channel) = self.state.channels.get_mut(index) else {
            return;
        };
        channel.coupling = coupling;
        channel.rounded_range = quantize_range(ladder, channel.requested_range, coupling);
        self.push_channel(index);
    }

    /// Request a full-scale range; the nearest ladder value at or above it is used.
    pub fn set_range(&mut self, index: usize, requested: f64) {
        let ladder = self.driver.family().range_ladder();
        let Some(channel) = self.state.channels.get_mut(index) else {
            return;
        };
        channel.requested_range = requested;
        channel.rounded_range = quantize_range(ladder, requested, channel.coupling);
        debug!(
            channel = index,
            requested,
            rounded = channel.rounded_range,
            "range quantized"
        );
        self.clamp_channel_offset(index);
        self.state.timing.depth_changed = true;
        self.push_channel(index);
    }

    /// Set a channel offset, clamped to what the current range allows.
    pub fn set_offset(&mut self, index: usize, requested: f64) {
        let Some(channel) = self.state.channels.get_mut(index) else {
            return;
        };
        channel.offset = requested;
        self.clamp_channel_offset(index);
        self.push_channel(index);
    }

    /// Select a bandwidth limiter in MHz; unknown values mean full bandwidth.
    pub fn set_bandwidth_limit(&mut self, index: usize, mhz: u32) {
        if index >= self.state.channels.len() {
            return;
        }
        let limit = if self.driver.family().bandwidth_limits_mhz().contains(&mhz) {
            BandwidthLimit::Mhz(mhz)
        } else {
            BandwidthLimit::Full
        };
        self.state.channels[index].bandwidth = limit;
        logged(
            "set_bandwidth_limit",
            self.driver.set_bandwidth_limit(index, limit),
        );
        self.refresh_trigger_for(ChannelKey::Analog(index));
    }

    fn clamp_channel_offset(&mut self, index: usize) {
        let channel = &self.state.channels[index];
        let (range, coupling, requested) = (channel.rounded_range, channel.coupling, channel.offset);
        if let Some(limits) = logged(
            "analog_offset_limits",
            self.driver.analog_offset_limits(range, coupling),
        ) {
            self.state.channels[index].offset = clamp_offset(requested, limits);
        }
    }

    /// Push one channel's frontend configuration and re-derive dependents.
    pub(crate) fn push_channel(&mut self, index: usize) {
        self.push_frontend(index);
        self.refresh_trigger_for(ChannelKey::Analog(index));
    }

    fn push_frontend(&mut self, index: usize) {
        let channel = &self.state.channels[index];
        let setup = AnalogSetup {
            enabled: channel.enabled,
            coupling: channel.coupling,
            range: channel.rounded_range,
            offset: channel.offset,
        };
        logged("set_channel", self.driver.set_channel(index, &setup));
        if let Some(code) = logged("adc_full_scale_code", self.driver.adc_full_scale_code()) {
            self.state.adc_full_scale = code;
        }
    }

    /// The trigger threshold is a raw ADC code, so it follows its channel's frontend.
    fn refresh_trigger_for(&mut self, key: ChannelKey) {
        if self.state.trigger.source == key {
            self.update_trigger(false);
        }
    }

    // =========================================================================
    // Digital pods
    // =========================================================================

    pub(crate) fn set_pod_enabled(&mut self, pod: usize, enabled: bool) {
        let state = &self.state.pods[pod];
        let result =
            self.driver
                .set_digital_port(pod, enabled, &state.thresholds, state.hysteresis);
        match result {
            Ok(()) => self.state.pods[pod].enabled = enabled,
            Err(err) => {
                error!(pod, enabled, code = err.code(), error = %err, "set_digital_port failed");
                if !enabled {
                    self.state.pods[pod].enabled = false;
                }
            }
        }
    }

    /// Set a pod threshold in volts for one lane, or the whole pod on
    /// hardware with a shared threshold.
    pub fn set_pod_threshold(&mut self, pod: usize, lane: usize, volts: f64) -> bool {
        let family = self.driver.family();
        let code = family.pod_threshold_code(volts);
        let per_lane = family.per_lane_thresholds();
        let Some(state) = self.state.pods.get_mut(pod) else {
            return false;
        };

        if per_lane {
            if let Some(slot) = state.thresholds.get_mut(lane) {
                *slot = code;
            }
        } else {
            state.thresholds = [code; crate::hardware::LANES_PER_POD];
        }
        state.threshold_volts = volts;
        debug!(pod, lane, volts, code, "pod threshold");

        if state.enabled {
            self.set_pod_enabled(pod, true);
        }
        true
    }

    /// Set pod hysteresis from a level in millivolts.
    pub fn set_pod_hysteresis(&mut self, pod: usize, millivolts: f64) -> bool {
        if !self.driver.family().supports_hysteresis() {
            debug!(pod, "pod hysteresis not adjustable on this instrument");
            return false;
        }
        let Some(state) = self.state.pods.get_mut(pod) else {
            return false;
        };
        state.hysteresis = Hysteresis::from_millivolts(millivolts);
        debug!(pod, millivolts, band = state.hysteresis.millivolts(), "pod hysteresis");
        if state.enabled {
            self.set_pod_enabled(pod, true);
        }
        true
    }

    /// Whether a probe is attached to a pod.
    pub fn pod_present(&mut self, pod: usize) -> bool {
        if pod >= self.state.pods.len() {
            return false;
        }
        let present = logged("probe_digital_pod", self.driver.probe_digital_pod(pod))
            .unwrap_or(false);
        // probing may toggle the pod
        if self.state.pods[pod].enabled {
            self.set_pod_enabled(pod, true);
        }
        present
    }

    // =========================================================================
    // Timing
    // =========================================================================

    /// Set the sample rate in Hz.
    pub fn set_sample_rate(&mut self, rate_hz: u64) -> bool {
        let Some(interval_fs) = interval_fs_for_rate(rate_hz) else {
            warn!(rate_hz, "sample rate must be positive");
            return false;
        };
        let timing = &mut self.state.timing;
        timing.interval_fs = interval_fs;
        timing.timebase = self
            .driver
            .family()
            .timebase_for_rate(rate_hz, timing.resolution_bits);
        debug!(rate_hz, interval_fs, timebase = timing.timebase, "sample rate");
        self.update_trigger(false);
        true
    }

    /// Set the memory depth in samples.
    pub fn set_depth(&mut self, depth: u64) -> bool {
        if depth == 0 {
            warn!("memory depth must be positive");
            return false;
        }
        self.state.timing.depth = depth;
        self.update_trigger(false);
        true
    }

    /// Change ADC resolution. Unsupported values are logged and ignored.
    pub fn set_resolution(&mut self, bits: u8) -> bool {
        if !self.driver.family().resolutions().contains(&bits) {
            error!(
                bits,
                supported = ?self.driver.family().resolutions(),
                "unsupported ADC resolution"
            );
            return false;
        }

        self.stop_hardware();
        self.state.timing.depth_changed = true;
        if logged("set_resolution", self.driver.set_resolution(bits)).is_some() {
            let timing = &mut self.state.timing;
            timing.resolution_bits = bits;
            // timebase closed forms depend on resolution
            if timing.interval_fs > 0 {
                let rate_hz = FS_PER_SECOND / timing.interval_fs;
                timing.timebase = self.driver.family().timebase_for_rate(rate_hz, bits);
            }
        }
        if self.state.trigger.armed {
            self.start_capture(false, false);
        }
        for index in 0..self.state.channels.len() {
            if self.state.channels[index].enabled {
                self.push_channel(index);
            }
        }
        true
    }

    /// Achievable sample rates at the current configuration, Hz.
    pub fn sample_rates(&mut self) -> Vec<u64> {
        let bits = self.state.timing.resolution_bits;
        quantize::enumerate_rates(self.driver.as_mut(), bits)
    }

    /// Offered memory depths at the current configuration.
    pub fn sample_depths(&mut self) -> Vec<u64> {
        quantize::enumerate_depths(self.driver.as_mut())
    }

    // =========================================================================
    // Session end
    // =========================================================================

    /// Stop acquisition and switch every input off.
    pub fn reset_to_safe_state(&mut self) {
        self.stop();
        for index in 0..self.state.channels.len() {
            self.state.channels[index].enabled = false;
            self.push_channel(index);
        }
        for pod in 0..self.state.pods.len() {
            self.set_pod_enabled(pod, false);
        }
        self.state.timing.depth_changed = true;
        info!("all inputs disabled");
    }
}
