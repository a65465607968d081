//! Simulated oscilloscope.
//!
//! `SimulatedScope` implements every capability trait on top of an
//! [`InstrumentFamily`] profile, so rate/depth enumeration, timebase lookups
//! and generator behavior match the selected series. It keeps a shared
//! [`SimProbe`] that records each call and lets tests script failures:
//!
//! ```rust,ignore
//! let scope = SimulatedScope::builder(Box::new(Series6000E)).build();
//! let probe = scope.probe();
//! probe.inject("run_block", HardwareError::StillCapturing);
//! // ... hand `scope` to an Instrument, drive it, then inspect:
//! assert_eq!(probe.count(|c| matches!(c, HwCall::Stop)), 1);
//! ```
//!
//! A block capture starts in `run_block` and stays "in progress" until it is
//! stopped. Calling `run_block` again while one is in progress reports
//! [`HardwareError::StillCapturing`], the same way real hardware does.

use super::{
    Acquisition, AnalogFrontend, AnalogSetup, BandwidthLimit, Coupling, DigitalPods,
    EdgeDirection, GeneratorWaveform, Hysteresis, Identity, InstrumentFamily, ScopeDriver,
    SignalGenerator, TimebaseInfo, TriggerControl, WaveShape, LANES_PER_POD,
};
use crate::addressing::ChannelKey;
use crate::error::{HardwareError, HardwareResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

/// One recorded capability-layer call.
#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    SetChannel { index: usize, setup: AnalogSetup },
    SetBandwidthLimit { index: usize, limit: BandwidthLimit },
    SetDigitalPort {
        pod: usize,
        on: bool,
        thresholds: [i16; LANES_PER_POD],
        hysteresis: Hysteresis,
    },
    ProbeDigitalPod { pod: usize },
    SetTriggerSimple {
        source: ChannelKey,
        threshold_code: i16,
        direction: EdgeDirection,
        delay_samples: u64,
        timeout_us: u32,
    },
    SetTriggerDigital {
        pod: usize,
        lane: usize,
        direction: EdgeDirection,
    },
    GetTimebase { index: u32 },
    OffsetLimits { range: f64, coupling: Coupling },
    AdcFullScale,
    RunBlock {
        pre_samples: u64,
        post_samples: u64,
        timebase: u32,
    },
    Stop,
    IsReady,
    SetResolution { bits: u8 },
    SetGeneratorBuiltIn {
        shape: WaveShape,
        duty_percent: Option<f64>,
    },
    SetGeneratorArbitrary {
        len: usize,
        /// Samples above zero
        high_samples: usize,
    },
    SetGeneratorRange { peak_to_peak: f64, offset: f64 },
    ApplyGenerator { on: bool, frequency_hz: f64 },
}

impl HwCall {
    /// True for calls that change acquisition state (run/stop).
    pub fn is_acquisition_control(&self) -> bool {
        matches!(self, HwCall::RunBlock { .. } | HwCall::Stop)
    }
}

/// Calls kept by a scope built without an explicit log capacity.
pub const DEFAULT_CALL_LOG_CAPACITY: usize = 4096;

#[derive(Debug)]
struct SimShared {
    /// Ring of the most recent calls, at most `capacity` long
    calls: VecDeque<HwCall>,
    capacity: usize,
    faults: HashMap<&'static str, VecDeque<HardwareError>>,
    capture_complete: bool,
}

/// Test and diagnostics handle onto a [`SimulatedScope`].
///
/// Cloning is cheap; all clones observe the same scope. Only the most recent
/// calls are kept (see [`SimulatedScopeBuilder::call_log_capacity`]).
#[derive(Debug, Clone)]
pub struct SimProbe {
    shared: Arc<Mutex<SimShared>>,
}

impl SimProbe {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SimShared {
                calls: VecDeque::with_capacity(capacity.min(DEFAULT_CALL_LOG_CAPACITY)),
                capacity,
                faults: HashMap::new(),
                capture_complete: false,
            })),
        }
    }

    /// Every call still in the log, oldest first
    pub fn calls(&self) -> Vec<HwCall> {
        self.shared.lock().calls.iter().cloned().collect()
    }

    /// Number of recorded calls matching a predicate
    pub fn count(&self, predicate: impl Fn(&HwCall) -> bool) -> usize {
        self.shared.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Most recent call matching a predicate
    pub fn last(&self, predicate: impl Fn(&HwCall) -> bool) -> Option<HwCall> {
        self.shared
            .lock()
            .calls
            .iter()
            .rev()
            .find(|c| predicate(c))
            .cloned()
    }

    /// Forget recorded calls
    pub fn clear(&self) {
        self.shared.lock().calls.clear();
    }

    /// Make the next call of `operation` fail with `error`.
    ///
    /// Injections for the same operation queue up and are consumed in order.
    pub fn inject(&self, operation: &'static str, error: HardwareError) {
        self.shared
            .lock()
            .faults
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Report the in-progress block as captured
    pub fn complete_capture(&self) {
        self.shared.lock().capture_complete = true;
    }

    fn record(&self, call: HwCall) {
        trace!(?call, "sim call");
        let mut shared = self.shared.lock();
        if shared.capacity == 0 {
            return;
        }
        if shared.calls.len() == shared.capacity {
            shared.calls.pop_front();
        }
        shared.calls.push_back(call);
    }

    fn take_fault(&self, operation: &'static str) -> HardwareResult<()> {
        let mut shared = self.shared.lock();
        match shared.faults.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn take_capture_complete(&self) -> bool {
        std::mem::take(&mut self.shared.lock().capture_complete)
    }
}

/// Builder for [`SimulatedScope`].
#[derive(Debug)]
pub struct SimulatedScopeBuilder {
    family: Box<dyn InstrumentFamily>,
    model: Option<String>,
    serial: String,
    analog_channels: Option<usize>,
    digital_pods: Option<usize>,
    attached_pods: Option<Vec<bool>>,
    auto_complete: bool,
    call_log_capacity: usize,
}

impl SimulatedScopeBuilder {
    /// Override the reported model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the reported serial number
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    /// Override the analog channel count
    pub fn analog_channels(mut self, count: usize) -> Self {
        self.analog_channels = Some(count);
        self
    }

    /// Override the MSO pod count
    pub fn digital_pods(mut self, count: usize) -> Self {
        self.digital_pods = Some(count);
        self
    }

    /// Which pods have a probe attached (defaults to all)
    pub fn attached_pods(mut self, attached: Vec<bool>) -> Self {
        self.attached_pods = Some(attached);
        self
    }

    /// Report every armed block as captured on the first readiness poll
    pub fn auto_complete(mut self, enabled: bool) -> Self {
        self.auto_complete = enabled;
        self
    }

    /// Keep at most `capacity` recorded calls; 0 turns recording off
    pub fn call_log_capacity(mut self, capacity: usize) -> Self {
        self.call_log_capacity = capacity;
        self
    }

    /// Build the simulated scope
    pub fn build(self) -> SimulatedScope {
        let channels = self
            .analog_channels
            .unwrap_or_else(|| self.family.default_analog_channels());
        let pods = self
            .digital_pods
            .unwrap_or_else(|| self.family.default_digital_pods());
        let attached = self.attached_pods.unwrap_or_else(|| vec![true; pods]);
        let bits = self.family.resolutions().first().copied().unwrap_or(8);
        let identity = Identity {
            make: "Pico Technology".to_string(),
            model: self
                .model
                .unwrap_or_else(|| self.family.default_model().to_string()),
            serial: self.serial,
            firmware: format!("sim-{}", env!("CARGO_PKG_VERSION")),
        };

        SimulatedScope {
            family: self.family,
            identity,
            channels: vec![None; channels],
            pods_enabled: vec![false; pods],
            attached,
            bits,
            capturing: false,
            auto_complete: self.auto_complete,
            probe: SimProbe::with_capacity(self.call_log_capacity),
        }
    }
}

/// Family-accurate simulated oscilloscope.
#[derive(Debug)]
pub struct SimulatedScope {
    family: Box<dyn InstrumentFamily>,
    identity: Identity,
    /// Last setup per channel, `None` until first configured
    channels: Vec<Option<AnalogSetup>>,
    pods_enabled: Vec<bool>,
    attached: Vec<bool>,
    bits: u8,
    capturing: bool,
    auto_complete: bool,
    probe: SimProbe,
}

impl SimulatedScope {
    /// Start building a simulated scope of the given family
    pub fn builder(family: Box<dyn InstrumentFamily>) -> SimulatedScopeBuilder {
        SimulatedScopeBuilder {
            family,
            model: None,
            serial: "SIM0001/0001".to_string(),
            analog_channels: None,
            digital_pods: None,
            attached_pods: None,
            auto_complete: false,
            call_log_capacity: DEFAULT_CALL_LOG_CAPACITY,
        }
    }

    /// Shared call log and fault injection handle
    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }

    fn enabled_sources(&self) -> u64 {
        let analog = self
            .channels
            .iter()
            .filter(|c| c.is_some_and(|s| s.enabled))
            .count();
        let pods = self.pods_enabled.iter().filter(|on| **on).count();
        (analog + pods) as u64
    }

    fn check_channel(&self, index: usize) -> HardwareResult<()> {
        if index < self.channels.len() {
            Ok(())
        } else {
            Err(HardwareError::InvalidChannel)
        }
    }

    fn check_pod(&self, pod: usize) -> HardwareResult<()> {
        if pod < self.pods_enabled.len() {
            Ok(())
        } else {
            Err(HardwareError::InvalidChannel)
        }
    }
}

impl ScopeDriver for SimulatedScope {
    fn family(&self) -> &dyn InstrumentFamily {
        self.family.as_ref()
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn analog_channel_count(&self) -> usize {
        self.channels.len()
    }

    fn digital_pod_count(&self) -> usize {
        self.pods_enabled.len()
    }
}

impl AnalogFrontend for SimulatedScope {
    fn set_channel(&mut self, index: usize, setup: &AnalogSetup) -> HardwareResult<()> {
        self.probe.record(HwCall::SetChannel {
            index,
            setup: *setup,
        });
        self.probe.take_fault("set_channel")?;
        self.check_channel(index)?;
        if setup.coupling.is_fifty_ohm() && !self.family.supports_fifty_ohm() {
            return Err(HardwareError::NotSupported {
                operation: "50 ohm coupling",
            });
        }
        self.channels[index] = Some(*setup);
        Ok(())
    }

    fn set_bandwidth_limit(&mut self, index: usize, limit: BandwidthLimit) -> HardwareResult<()> {
        self.probe.record(HwCall::SetBandwidthLimit { index, limit });
        self.probe.take_fault("set_bandwidth_limit")?;
        self.check_channel(index)?;
        match limit {
            BandwidthLimit::Mhz(mhz) if !self.family.bandwidth_limits_mhz().contains(&mhz) => {
                Err(HardwareError::NotSupported {
                    operation: "bandwidth limit",
                })
            }
            _ => Ok(()),
        }
    }

    fn analog_offset_limits(
        &mut self,
        range: f64,
        coupling: Coupling,
    ) -> HardwareResult<(f64, f64)> {
        self.probe.record(HwCall::OffsetLimits { range, coupling });
        self.probe.take_fault("analog_offset_limits")?;
        let mut limit = if range <= 0.2 {
            0.25
        } else if range <= 2.0 {
            2.5
        } else {
            20.0
        };
        if coupling.is_fifty_ohm() {
            limit = f64::min(limit, 2.5);
        }
        Ok((-limit, limit))
    }

    fn adc_full_scale_code(&mut self) -> HardwareResult<i16> {
        self.probe.record(HwCall::AdcFullScale);
        self.probe.take_fault("adc_full_scale_code")?;
        Ok(self.family.adc_full_scale_code(self.bits))
    }
}

impl DigitalPods for SimulatedScope {
    fn set_digital_port(
        &mut self,
        pod: usize,
        on: bool,
        thresholds: &[i16; LANES_PER_POD],
        hysteresis: Hysteresis,
    ) -> HardwareResult<()> {
        self.probe.record(HwCall::SetDigitalPort {
            pod,
            on,
            thresholds: *thresholds,
            hysteresis,
        });
        self.probe.take_fault("set_digital_port")?;
        self.check_pod(pod)?;
        if on && !self.attached.get(pod).copied().unwrap_or(false) {
            return Err(HardwareError::NoPodConnected { pod: pod as u8 });
        }
        self.pods_enabled[pod] = on;
        Ok(())
    }

    fn probe_digital_pod(&mut self, pod: usize) -> HardwareResult<bool> {
        self.probe.record(HwCall::ProbeDigitalPod { pod });
        self.probe.take_fault("probe_digital_pod")?;
        self.check_pod(pod)?;
        Ok(self.attached.get(pod).copied().unwrap_or(false))
    }
}

impl TriggerControl for SimulatedScope {
    fn set_trigger_simple(
        &mut self,
        source: ChannelKey,
        threshold_code: i16,
        direction: EdgeDirection,
        delay_samples: u64,
        timeout_us: u32,
    ) -> HardwareResult<()> {
        self.probe.record(HwCall::SetTriggerSimple {
            source,
            threshold_code,
            direction,
            delay_samples,
            timeout_us,
        });
        self.probe.take_fault("set_trigger_simple")?;
        match source {
            ChannelKey::Analog(index) => self.check_channel(index),
            ChannelKey::Auxiliary => Ok(()),
            ChannelKey::Digital { .. } => Err(HardwareError::InvalidChannel),
        }
    }

    fn set_trigger_digital(
        &mut self,
        pod: usize,
        lane: usize,
        direction: EdgeDirection,
    ) -> HardwareResult<()> {
        self.probe.record(HwCall::SetTriggerDigital {
            pod,
            lane,
            direction,
        });
        self.probe.take_fault("set_trigger_digital")?;
        self.check_pod(pod)
    }
}

impl Acquisition for SimulatedScope {
    fn get_timebase(&mut self, index: u32) -> HardwareResult<TimebaseInfo> {
        self.probe.record(HwCall::GetTimebase { index });
        self.probe.take_fault("get_timebase")?;
        let interval_ns = self
            .family
            .timebase_interval_ns(index, self.bits)
            .ok_or(HardwareError::InvalidTimebase { index })?;
        let max_samples = self.family.memory_samples() / self.enabled_sources().max(1);
        Ok(TimebaseInfo {
            interval_ns,
            max_samples,
        })
    }

    fn run_block(
        &mut self,
        pre_samples: u64,
        post_samples: u64,
        timebase: u32,
    ) -> HardwareResult<()> {
        self.probe.record(HwCall::RunBlock {
            pre_samples,
            post_samples,
            timebase,
        });
        self.probe.take_fault("run_block")?;
        if self.capturing {
            return Err(HardwareError::StillCapturing);
        }
        if self.enabled_sources() == 0 {
            return Err(HardwareError::NoChannelsEnabled);
        }
        if self.family.timebase_interval_ns(timebase, self.bits).is_none() {
            return Err(HardwareError::InvalidTimebase { index: timebase });
        }
        self.capturing = true;
        Ok(())
    }

    fn stop(&mut self) -> HardwareResult<()> {
        self.probe.record(HwCall::Stop);
        self.probe.take_fault("stop")?;
        self.capturing = false;
        Ok(())
    }

    fn is_ready(&mut self) -> HardwareResult<bool> {
        self.probe.record(HwCall::IsReady);
        self.probe.take_fault("is_ready")?;
        let signalled = self.probe.take_capture_complete();
        Ok(self.capturing && (self.auto_complete || signalled))
    }

    fn set_resolution(&mut self, bits: u8) -> HardwareResult<()> {
        self.probe.record(HwCall::SetResolution { bits });
        self.probe.take_fault("set_resolution")?;
        if !self.family.resolutions().contains(&bits) {
            return Err(HardwareError::NotSupported {
                operation: "resolution",
            });
        }
        self.bits = bits;
        Ok(())
    }
}

impl SignalGenerator for SimulatedScope {
    fn set_generator_waveform(&mut self, waveform: GeneratorWaveform<'_>) -> HardwareResult<()> {
        let call = match waveform {
            GeneratorWaveform::BuiltIn {
                shape,
                duty_percent,
            } => HwCall::SetGeneratorBuiltIn {
                shape,
                duty_percent,
            },
            GeneratorWaveform::Arbitrary(samples) => HwCall::SetGeneratorArbitrary {
                len: samples.len(),
                high_samples: samples.iter().filter(|s| **s > 0).count(),
            },
        };
        self.probe.record(call);
        self.probe.take_fault("set_generator_waveform")?;
        if let GeneratorWaveform::BuiltIn {
            duty_percent: Some(_),
            ..
        } = waveform
        {
            if !self.family.native_duty_cycle() {
                return Err(HardwareError::NotSupported {
                    operation: "duty cycle",
                });
            }
        }
        Ok(())
    }

    fn set_generator_range(&mut self, peak_to_peak: f64, offset: f64) -> HardwareResult<()> {
        self.probe.record(HwCall::SetGeneratorRange {
            peak_to_peak,
            offset,
        });
        self.probe.take_fault("set_generator_range")
    }

    fn apply_generator(&mut self, on: bool, frequency_hz: f64) -> HardwareResult<()> {
        self.probe
            .record(HwCall::ApplyGenerator { on, frequency_hz });
        self.probe.take_fault("apply_generator")
    }
}
