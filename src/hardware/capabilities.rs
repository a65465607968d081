//! Per-concern hardware capabilities.
//!
//! Oscilloscope access is split into five small traits rather than one large
//! driver trait:
//!
//! - [`AnalogFrontend`]: per-channel input configuration and offset limits
//! - [`DigitalPods`]: MSO pod enable, thresholds and presence probing
//! - [`TriggerControl`]: simple (threshold) and digital triggers
//! - [`Acquisition`]: timebase queries, block capture, resolution
//! - [`SignalGenerator`]: built-in and arbitrary waveform output
//!
//! A driver implements all five and is used through
//! [`ScopeDriver`](super::ScopeDriver). Calls block and take `&mut self`;
//! the instrument lock serializes them. Every call returns a
//! [`HardwareResult`] whose error classifies as transient, enumeration gap
//! or hard failure.
//!
//! # Example
//!
//! ```rust,ignore
//! fn arm_channel_a<D: AnalogFrontend + Acquisition>(scope: &mut D) -> HardwareResult<()> {
//!     let setup = AnalogSetup { enabled: true, coupling: Coupling::Dc1M, range: 1.0, offset: 0.0 };
//!     scope.set_channel(0, &setup)?;
//!     scope.run_block(0, 1000, 3)
//! }
//! ```

use super::{
    AnalogSetup, BandwidthLimit, Coupling, EdgeDirection, GeneratorWaveform, Hysteresis,
    TimebaseInfo, LANES_PER_POD,
};
use crate::addressing::ChannelKey;
use crate::error::HardwareResult;

/// Capability: Analog Input Frontend
///
/// # Contract
/// - `index` is zero-based and below the instrument's analog channel count
/// - `setup.range` is always a ladder value; quantization happens upstream
/// - `set_channel` applies enable, coupling, range and offset in one call
pub trait AnalogFrontend {
    /// Apply the complete frontend configuration of one channel
    fn set_channel(&mut self, index: usize, setup: &AnalogSetup) -> HardwareResult<()>;

    /// Select the bandwidth limiter of one channel
    fn set_bandwidth_limit(&mut self, index: usize, limit: BandwidthLimit) -> HardwareResult<()>;

    /// Offset window (min, max) in volts allowed for a range/coupling pair
    fn analog_offset_limits(&mut self, range: f64, coupling: Coupling)
        -> HardwareResult<(f64, f64)>;

    /// Raw ADC code corresponding to the positive full-scale voltage
    fn adc_full_scale_code(&mut self) -> HardwareResult<i16>;
}

/// Capability: Digital (MSO) Pods
///
/// # Contract
/// - `thresholds` holds one code per lane; shared-threshold hardware reads lane 0
/// - Disabling a pod leaves thresholds untouched
pub trait DigitalPods {
    /// Enable or disable a pod with its thresholds and hysteresis
    fn set_digital_port(
        &mut self,
        pod: usize,
        on: bool,
        thresholds: &[i16; LANES_PER_POD],
        hysteresis: Hysteresis,
    ) -> HardwareResult<()>;

    /// Check whether a pod is physically attached
    ///
    /// May toggle the pod on the hardware; callers re-apply the pod state after
    /// probing if it was enabled.
    fn probe_digital_pod(&mut self, pod: usize) -> HardwareResult<bool>;
}

/// Capability: Trigger Control
///
/// # Contract
/// - Only one trigger source is active; each call replaces the previous one
/// - `delay_samples` is the post-trigger delay; pre-trigger depth goes to `run_block`
/// - `timeout_us == 0` waits forever, any other value auto-triggers
pub trait TriggerControl {
    /// Edge trigger on an analog or auxiliary input
    fn set_trigger_simple(
        &mut self,
        source: ChannelKey,
        threshold_code: i16,
        direction: EdgeDirection,
        delay_samples: u64,
        timeout_us: u32,
    ) -> HardwareResult<()>;

    /// Edge trigger on one lane of a digital pod
    fn set_trigger_digital(
        &mut self,
        pod: usize,
        lane: usize,
        direction: EdgeDirection,
    ) -> HardwareResult<()>;
}

/// Capability: Block Acquisition
///
/// # Contract
/// - `run_block` returns [`HardwareError::StillCapturing`](crate::error::HardwareError)
///   while a previous capture owns the device; callers stop and retry
/// - `get_timebase` reflects the currently enabled channels and resolution
pub trait Acquisition {
    /// Sample interval and memory depth for a timebase index
    fn get_timebase(&mut self, index: u32) -> HardwareResult<TimebaseInfo>;

    /// Arm a single block capture
    fn run_block(&mut self, pre_samples: u64, post_samples: u64, timebase: u32)
        -> HardwareResult<()>;

    /// Abort any capture in progress
    fn stop(&mut self) -> HardwareResult<()>;

    /// True once an armed block has been captured
    fn is_ready(&mut self) -> HardwareResult<bool>;

    /// Change ADC resolution (bits)
    fn set_resolution(&mut self, bits: u8) -> HardwareResult<()>;
}

/// Capability: Function Generator
///
/// # Contract
/// - The three calls are always issued together, waveform first, then range,
///   then `apply_generator`, so the output never sees a partial configuration
/// - `frequency_hz` is strictly positive
pub trait SignalGenerator {
    /// Select a built-in shape or load an arbitrary buffer
    fn set_generator_waveform(&mut self, waveform: GeneratorWaveform<'_>) -> HardwareResult<()>;

    /// Peak-to-peak amplitude and DC offset, volts
    fn set_generator_range(&mut self, peak_to_peak: f64, offset: f64) -> HardwareResult<()>;

    /// Commit the configuration and switch the output on or off
    fn apply_generator(&mut self, on: bool, frequency_hz: f64) -> HardwareResult<()>;
}
