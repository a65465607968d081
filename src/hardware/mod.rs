//! Hardware capability layer.
//!
//! Everything the bridge core needs from an oscilloscope goes through
//! [`ScopeDriver`], a composition of the small capability traits in
//! [`capabilities`] plus a handle to the instrument's [`InstrumentFamily`]
//! profile. The core never matches on a model or family; ladders, timebase
//! formulas and generator quirks are answered by the family profile, and
//! vendor calls by the driver.
//!
//! [`sim::SimulatedScope`] is the only in-tree driver. It behaves like the
//! selected family and records every call for tests.

pub mod capabilities;
pub mod family;
pub mod sim;

use std::fmt;

pub use capabilities::{AnalogFrontend, Acquisition, DigitalPods, SignalGenerator, TriggerControl};
pub use family::InstrumentFamily;

/// Lanes in one MSO pod.
pub const LANES_PER_POD: usize = 8;

/// Highest pod count any supported instrument carries.
pub const MAX_PODS: usize = 2;

/// Full capability set of one oscilloscope.
pub trait ScopeDriver:
    AnalogFrontend + DigitalPods + TriggerControl + Acquisition + SignalGenerator + Send
{
    /// Static description of the instrument family behind this driver
    fn family(&self) -> &dyn InstrumentFamily;

    /// Make, model, serial number and firmware version
    fn identity(&self) -> &Identity;

    /// Physical analog input count
    fn analog_channel_count(&self) -> usize;

    /// Physical MSO pod count (0 for non-MSO models)
    fn digital_pod_count(&self) -> usize;
}

/// Instrument identification, as reported by `*IDN?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub make: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.make, self.model, self.serial, self.firmware)
    }
}

/// Input coupling and termination of an analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coupling {
    /// DC coupled, 1 MΩ termination
    #[default]
    Dc1M,
    /// AC coupled, 1 MΩ termination
    Ac1M,
    /// DC coupled, 50 Ω termination
    Dc50,
}

impl Coupling {
    /// Parse a protocol token (`DC1M`, `AC1M`, `DC50`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "DC1M" => Some(Self::Dc1M),
            "AC1M" => Some(Self::Ac1M),
            "DC50" => Some(Self::Dc50),
            _ => None,
        }
    }

    /// True when the input is terminated into 50 Ω.
    pub fn is_fifty_ohm(self) -> bool {
        matches!(self, Self::Dc50)
    }
}

/// Trigger edge selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeDirection {
    #[default]
    Rising,
    Falling,
    /// Either edge
    Any,
}

impl EdgeDirection {
    /// Parse a protocol token (`RISING`, `FALLING`, `ANY`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "RISING" => Some(Self::Rising),
            "FALLING" => Some(Self::Falling),
            "ANY" => Some(Self::Any),
            _ => None,
        }
    }
}

/// Bandwidth limiter setting of an analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandwidthLimit {
    /// No limiter
    #[default]
    Full,
    /// Limited to the given frequency in MHz
    Mhz(u32),
}

impl BandwidthLimit {
    /// Limiter frequency in MHz, `0` meaning full bandwidth.
    pub fn as_mhz(self) -> u32 {
        match self {
            Self::Full => 0,
            Self::Mhz(mhz) => mhz,
        }
    }
}

/// Threshold hysteresis band of an MSO pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hysteresis {
    Low50mV,
    #[default]
    Normal100mV,
    High200mV,
    VeryHigh400mV,
}

impl Hysteresis {
    /// Pick the smallest band covering the requested level.
    pub fn from_millivolts(level: f64) -> Self {
        if level <= 50.0 {
            Self::Low50mV
        } else if level <= 100.0 {
            Self::Normal100mV
        } else if level <= 200.0 {
            Self::High200mV
        } else {
            Self::VeryHigh400mV
        }
    }

    /// Band width in millivolts.
    pub fn millivolts(self) -> u32 {
        match self {
            Self::Low50mV => 50,
            Self::Normal100mV => 100,
            Self::High200mV => 200,
            Self::VeryHigh400mV => 400,
        }
    }
}

/// Waveform shapes of the function generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveShape {
    #[default]
    Sine,
    Square,
    Triangle,
    RampUp,
    RampDown,
    Sinc,
    Gaussian,
    HalfSine,
    Dc,
    WhiteNoise,
    Prbs,
    Arbitrary,
}

impl WaveShape {
    /// Parse a protocol token (`SINE`, `RAMP_UP`, `WHITENOISE`, ...).
    pub fn from_token(token: &str) -> Option<Self> {
        let shape = match token {
            "SINE" => Self::Sine,
            "SQUARE" => Self::Square,
            "TRIANGLE" => Self::Triangle,
            "RAMP_UP" => Self::RampUp,
            "RAMP_DOWN" => Self::RampDown,
            "SINC" => Self::Sinc,
            "GAUSSIAN" => Self::Gaussian,
            "HALF_SINE" => Self::HalfSine,
            "DC" => Self::Dc,
            "WHITENOISE" => Self::WhiteNoise,
            "PRBS" => Self::Prbs,
            "ARBITRARY" => Self::Arbitrary,
            _ => return None,
        };
        Some(shape)
    }
}

/// Complete frontend configuration pushed by [`AnalogFrontend::set_channel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogSetup {
    pub enabled: bool,
    pub coupling: Coupling,
    /// Rounded (ladder) range in volts
    pub range: f64,
    /// Offset in volts
    pub offset: f64,
}

/// Result of a timebase query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimebaseInfo {
    /// Sample interval in nanoseconds
    pub interval_ns: f64,
    /// Maximum samples available at this timebase
    pub max_samples: u64,
}

/// What the function generator should output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeneratorWaveform<'a> {
    /// One of the generator's built-in shapes
    BuiltIn {
        shape: WaveShape,
        /// Duty cycle in percent; only sent to hardware with native duty support
        duty_percent: Option<f64>,
    },
    /// Play back a sample buffer (full-scale is ±32767)
    Arbitrary(&'a [i16]),
}
