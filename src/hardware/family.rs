//! Instrument family profiles.
//!
//! Each supported oscilloscope series is described by one [`InstrumentFamily`]
//! implementation: its voltage range ladder, timebase closed forms, candidate
//! timebase lists, ADC resolutions, MSO pod characteristics and generator
//! quirks. The bridge core only ever talks to `dyn InstrumentFamily`.

use std::fmt;

/// Static description of an oscilloscope series.
///
/// # Contract
/// - `range_ladder` is strictly increasing and non-empty
/// - `timebase_interval_ns` returns `None` for indices the hardware rejects at
///   the given resolution
/// - `candidate_timebases` lists the indices worth probing when enumerating
///   sample rates, in increasing interval order
pub trait InstrumentFamily: Send + Sync + fmt::Debug {
    /// Short configuration name (`6000e`, `5000a`, ...)
    fn name(&self) -> &'static str;

    /// Model reported when none is configured
    fn default_model(&self) -> &'static str;

    /// Analog channel count of the default model
    fn default_analog_channels(&self) -> usize;

    /// MSO pod count of the default model
    fn default_digital_pods(&self) -> usize;

    /// Supported full-scale voltages, ascending
    fn range_ladder(&self) -> &'static [f64];

    /// Whether DC 50 Ω termination is available
    fn supports_fifty_ohm(&self) -> bool;

    /// Bandwidth limiter frequencies in MHz (empty if no limiter)
    fn bandwidth_limits_mhz(&self) -> &'static [u32];

    /// ADC resolutions in bits; the first entry is the power-on default
    fn resolutions(&self) -> &'static [u8];

    /// Closed-form timebase index for a sample rate
    fn timebase_for_rate(&self, rate_hz: u64, bits: u8) -> u32;

    /// Sample interval of a timebase index, `None` if invalid
    fn timebase_interval_ns(&self, timebase: u32, bits: u8) -> Option<f64>;

    /// Timebase indices probed by rate enumeration
    fn candidate_timebases(&self, bits: u8) -> &'static [u32];

    /// Expected interval of a candidate, for families whose timebase index is
    /// itself a period; enumeration rejects results that drift from it
    fn nominal_interval_ns(&self, _timebase: u32) -> Option<f64> {
        None
    }

    /// Timebase used to query the maximum memory depth
    fn depth_probe_timebase(&self) -> u32 {
        10
    }

    /// Total sample memory
    fn memory_samples(&self) -> u64;

    /// Voltage represented by the maximum pod threshold code
    fn pod_threshold_full_scale(&self) -> f64;

    /// Whether each pod lane has its own threshold
    fn per_lane_thresholds(&self) -> bool;

    /// Whether pods have a configurable hysteresis band
    fn supports_hysteresis(&self) -> bool;

    /// Arbitrary waveform buffer length in samples
    fn generator_buffer_len(&self) -> usize;

    /// Whether the generator has a dedicated output-off primitive
    fn native_generator_stop(&self) -> bool;

    /// Whether built-in square waves accept a duty cycle
    fn native_duty_cycle(&self) -> bool;

    /// Whether acquisition must be stopped while the generator is reprogrammed
    fn generator_pauses_acquisition(&self) -> bool;

    /// ADC code of positive full scale
    fn adc_full_scale_code(&self, bits: u8) -> i16 {
        if bits > 8 {
            32767
        } else {
            32512
        }
    }

    /// Convert a pod threshold voltage into a hardware code
    fn pod_threshold_code(&self, volts: f64) -> i16 {
        let code = (volts * 32767.0 / self.pod_threshold_full_scale()).round();
        code.clamp(-32767.0, 32767.0) as i16
    }
}

/// Look up a family profile by configuration name (case-insensitive).
pub fn family_by_name(name: &str) -> Option<Box<dyn InstrumentFamily>> {
    let family: Box<dyn InstrumentFamily> = match name.to_ascii_lowercase().as_str() {
        "2000a" => Box::new(Series2000A),
        "3000a" => Box::new(Series3000A),
        "4000a" => Box::new(Series4000A),
        "5000a" => Box::new(Series5000A),
        "6000e" => Box::new(Series6000E),
        "3000e" => Box::new(Series3000E),
        _ => return None,
    };
    Some(family)
}

/// Names accepted by [`family_by_name`].
pub const FAMILY_NAMES: &[&str] = &["2000a", "3000a", "4000a", "5000a", "6000e", "3000e"];

/// Profile for a family narrowed to an exact model number.
///
/// Without a model this is [`family_by_name`]. With one, the returned
/// profile takes its channel and pod counts from the model number and
/// switches to the sub-model's timebase numbering where it differs from the
/// family default (500 MS/s 2000A parts, the 2205 MSO, 2-channel and USB 2.0
/// MSO 3000 parts, the 4444, the 6428E-D).
pub fn family_for_model(name: &str, model: Option<&str>) -> Option<Box<dyn InstrumentFamily>> {
    let base = family_by_name(name)?;
    let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) else {
        return Some(base);
    };
    let model = model.to_ascii_uppercase();
    let bytes = model.as_bytes();
    let revision = bytes.get(4).copied();
    let is_mso = model.contains("MSO");

    let (base, clock): (Box<dyn InstrumentFamily>, Option<Clock>) = match base.name() {
        "2000a" if model.contains("2205MSO") => (base, Some(Clock::Mso2205)),
        "2000a" if HALF_GIGASAMPLE_2000A.contains(&model.as_str()) => {
            (base, Some(Clock::HalfGigasample))
        }
        "3000a" if is_mso && revision != Some(b'D') => (base, Some(Clock::Usb2Mso)),
        "3000a" if bytes.get(1) == Some(&b'2') && matches!(revision, Some(b'A' | b'B')) => {
            (base, Some(Clock::HalfGigasample))
        }
        "4000a" if model.contains("4444") => (Box::new(Series4444), None),
        "6000e" if bytes.get(3) == Some(&b'8') => (base, Some(Clock::Ps6428E)),
        _ => (base, None),
    };
    Some(Box::new(ModelProfile::new(base, &model, clock)))
}

/// 2000A models limited to 500 MS/s.
const HALF_GIGASAMPLE_2000A: &[&str] = &["2206", "2206A", "2206B", "2205AMSO", "2405A"];

// =============================================================================
// Timebase numbering
// =============================================================================

const GIGASAMPLE_TIMEBASES: &[u32] = &[
    0, 1, 2, 3, 4, 6, 7, 10, 12, 18, 22, 27, 42, 52, 82, 102, 127, 162, 202, 252, 402, 502, 802,
    1002, 1252, 1602, 2002, 2502, 4002, 5002, 8002, 10002, 12502, 16002, 20002, 25002, 40002,
    50002, 80002, 100002, 125002,
];

const HALF_GIGASAMPLE_TIMEBASES: &[u32] = &[
    0, 1, 2, 3, 4, 6, 7, 10, 12, 22, 27, 42, 52, 82, 102, 127, 202, 252, 402, 502, 627, 802, 1002,
    1252, 2002, 2502, 4002, 5002, 6252, 8002, 10002, 12502, 20002, 25002, 40002, 50002, 62502,
];

const MSO_2205_TIMEBASES: &[u32] = &[
    0, 1, 2, 4, 5, 8, 10, 20, 25, 40, 50, 80, 100, 125, 200, 250, 400, 500, 800, 1000, 1250, 2000,
    2500, 4000, 5000, 8000, 10000, 12500, 20000, 25000, 40000, 50000, 80000, 100000,
];

const USB2_MSO_TIMEBASES: &[u32] = &[
    0, 1, 2, 3, 5, 6, 9, 11, 17, 21, 26, 41, 51, 81, 101, 126, 161, 201, 251, 401, 501, 801, 1001,
    1251, 1601, 2001, 2501, 4001, 5001, 8001, 10001, 12501, 16001, 20001, 25001, 40001, 50001,
    80001, 100001, 125001,
];

const PS4444_TIMEBASES: &[u32] = &[
    0, 1, 2, 3, 4, 6, 7, 12, 22, 27, 42, 52, 102, 127, 202, 252, 402, 502, 627, 1002, 1252, 2002,
    2502, 4002, 5002, 6252, 10002, 12502, 20002, 25002, 40002, 50002,
];

const PS4000_TIMEBASES: &[u32] = &[
    0, 1, 3, 7, 9, 15, 19, 31, 39, 63, 79, 99, 159, 199, 319, 399, 639, 799, 999, 1599, 1999,
    3199, 3999, 6399, 7999, 9999, 15999, 19999, 31999, 39999, 63999, 79999,
];

const PS6000E_TIMEBASES: &[u32] = &[
    0, 1, 2, 3, 4, 5, 6, 9, 14, 24, 29, 54, 104, 129, 204, 254, 504, 629, 1004, 1254, 2004, 2504,
    3129, 5004, 6254, 10004, 12504, 15629, 20004, 25004, 31254, 50004, 62504, 100004, 125004,
    156254,
];

const PS6428E_TIMEBASES: &[u32] = &[
    0, 1, 2, 3, 4, 5, 6, 7, 10, 15, 25, 30, 55, 105, 130, 205, 255, 505, 630, 1005, 1255, 2005,
    2505, 3130, 5005, 6255, 10005, 12505, 15630, 20005, 25005, 31255, 50005, 62505, 100005,
    125005, 156255,
];

/// Timebase numbering schemes shared between models.
///
/// Most parts count a few power-of-two steps up from their fastest period
/// and then switch to a linear divider; the schemes differ in base period,
/// divider step and offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// 1 GS/s: 1, 2, 4 ns, then 8 ns per count
    Gigasample,
    /// 500 MS/s: 2, 4, 8 ns, then 16 ns per count
    HalfGigasample,
    /// 2205 MSO: 5 ns, then 10 ns per count
    Mso2205,
    /// 3000 series USB 2.0 MSOs: 2, 4, 8 ns, then 8 ns per count offset by one
    Usb2Mso,
    /// PicoScope 4444: 2.5, 5, 10 ns, then 20 ns per count
    Ps4444,
    /// 80 MS/s 4000A parts: 12.5 ns per count
    Ps4000,
    /// 6000E: powers of two over a 200 ps clock, then 6.4 ns per count
    Ps6000E,
    /// 6428E-D: one 100 ps step ahead of the 6000E numbering
    Ps6428E,
}

impl Clock {
    /// Closed-form timebase index for a sample rate.
    pub fn timebase_for_rate(self, rate_hz: u64) -> u32 {
        let rate = rate_hz.max(1) as f64;
        let period = period_ns(rate_hz);
        match self {
            Clock::Gigasample => {
                if period < 2.0 {
                    0
                } else if period < 8.0 {
                    round_index((1e9 / rate).log2())
                } else {
                    round_index(125e6 / rate + 2.0)
                }
            }
            Clock::HalfGigasample => {
                if period < 4.0 {
                    0
                } else if period < 16.0 {
                    round_index((5e8 / rate).log2())
                } else {
                    round_index(62.5e6 / rate + 2.0)
                }
            }
            Clock::Mso2205 => {
                if period < 5.0 {
                    0
                } else {
                    round_index(100e6 / rate)
                }
            }
            Clock::Usb2Mso => {
                if period < 4.0 {
                    0
                } else if period < 8.0 {
                    round_index((5e8 / rate).log2())
                } else {
                    round_index(125e6 / rate + 1.0)
                }
            }
            Clock::Ps4444 => {
                if period < 5.0 {
                    0
                } else if period < 40.0 {
                    round_index((4e8 / rate).log2())
                } else {
                    round_index(50e6 / rate + 2.0)
                }
            }
            Clock::Ps4000 => (80e6 / rate - 1.0).trunc().max(0.0) as u32,
            Clock::Ps6000E => six_thousand_e_timebase(period),
            Clock::Ps6428E => {
                // 100 ps is index 0, everything else shifts up by one
                if period / 0.2 < 1.0 {
                    0
                } else {
                    six_thousand_e_timebase(period) + 1
                }
            }
        }
    }

    /// Sample interval of a timebase index.
    pub fn interval_ns(self, timebase: u32) -> f64 {
        let linear = |offset: u32, step: f64| f64::from(timebase.saturating_sub(offset)) * step;
        let doubling = |base: f64, exponent: u32| base * f64::from(1u32 << exponent.min(31));
        match self {
            Clock::Gigasample if timebase < 3 => doubling(1.0, timebase),
            Clock::Gigasample => linear(2, 8.0),
            Clock::HalfGigasample if timebase < 3 => doubling(2.0, timebase),
            Clock::HalfGigasample => linear(2, 16.0),
            Clock::Mso2205 if timebase == 0 => 5.0,
            Clock::Mso2205 => linear(0, 10.0),
            Clock::Usb2Mso if timebase < 3 => doubling(2.0, timebase),
            Clock::Usb2Mso => linear(1, 8.0),
            Clock::Ps4444 if timebase < 3 => doubling(2.5, timebase),
            Clock::Ps4444 => linear(2, 20.0),
            Clock::Ps4000 => f64::from(timebase.saturating_add(1)) * 12.5,
            Clock::Ps6000E if timebase < 5 => doubling(0.2, timebase),
            Clock::Ps6000E => linear(4, 6.4),
            Clock::Ps6428E if timebase == 0 => 0.1,
            Clock::Ps6428E if timebase < 6 => doubling(0.2, timebase - 1),
            Clock::Ps6428E => linear(5, 6.4),
        }
    }

    /// Timebase indices worth probing during rate enumeration.
    pub fn candidates(self) -> &'static [u32] {
        match self {
            Clock::Gigasample => GIGASAMPLE_TIMEBASES,
            Clock::HalfGigasample => HALF_GIGASAMPLE_TIMEBASES,
            Clock::Mso2205 => MSO_2205_TIMEBASES,
            Clock::Usb2Mso => USB2_MSO_TIMEBASES,
            Clock::Ps4444 => PS4444_TIMEBASES,
            Clock::Ps4000 => PS4000_TIMEBASES,
            Clock::Ps6000E => PS6000E_TIMEBASES,
            Clock::Ps6428E => PS6428E_TIMEBASES,
        }
    }
}

const LEGACY_LADDER: &[f64] = &[0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0];

fn period_ns(rate_hz: u64) -> f64 {
    1e9 / rate_hz.max(1) as f64
}

fn round_index(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

fn six_thousand_e_timebase(period: f64) -> u32 {
    let clock_divider = period / 0.2;
    if period < 5.0 {
        round_index(clock_divider.log2())
    } else {
        round_index(clock_divider / 32.0) + 4
    }
}

// =============================================================================
// Model-narrowed profile
// =============================================================================

/// A family profile adjusted for one model number.
///
/// Everything not derived from the model is answered by the wrapped family.
#[derive(Debug)]
pub struct ModelProfile {
    base: Box<dyn InstrumentFamily>,
    clock: Option<Clock>,
    analog_channels: usize,
    digital_pods: usize,
    generator_buffer_len: usize,
}

impl ModelProfile {
    fn new(base: Box<dyn InstrumentFamily>, model: &str, clock: Option<Clock>) -> Self {
        // second digit of the model number is the channel count
        let analog_channels = model
            .as_bytes()
            .get(1)
            .filter(|b| (b'1'..=b'8').contains(*b))
            .map_or(base.default_analog_channels(), |b| usize::from(b - b'0'));
        let digital_pods = match base.name() {
            "2000a" | "3000a" | "5000a" if model.contains("MSO") => 2,
            "2000a" | "3000a" | "5000a" | "4000a" => 0,
            _ => base.default_digital_pods(),
        };
        let generator_buffer_len = match base.name() {
            "3000a" if ["06A", "06B"].iter().any(|m| model.contains(m)) => 16384,
            "3000a" if ["05A", "05B", "04A", "04B"].iter().any(|m| model.contains(m)) => 8192,
            "5000a" if model.contains("42B") => 16384,
            "5000a" if model.contains("44B") => 49152,
            _ => base.generator_buffer_len(),
        };
        Self {
            base,
            clock,
            analog_channels,
            digital_pods,
            generator_buffer_len,
        }
    }

    /// Timebase numbering override, if the model differs from its family
    pub fn clock(&self) -> Option<Clock> {
        self.clock
    }
}

impl InstrumentFamily for ModelProfile {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn default_model(&self) -> &'static str {
        self.base.default_model()
    }

    fn default_analog_channels(&self) -> usize {
        self.analog_channels
    }

    fn default_digital_pods(&self) -> usize {
        self.digital_pods
    }

    fn range_ladder(&self) -> &'static [f64] {
        self.base.range_ladder()
    }

    fn supports_fifty_ohm(&self) -> bool {
        self.base.supports_fifty_ohm()
    }

    fn bandwidth_limits_mhz(&self) -> &'static [u32] {
        self.base.bandwidth_limits_mhz()
    }

    fn resolutions(&self) -> &'static [u8] {
        self.base.resolutions()
    }

    fn timebase_for_rate(&self, rate_hz: u64, bits: u8) -> u32 {
        match self.clock {
            Some(clock) => clock.timebase_for_rate(rate_hz),
            None => self.base.timebase_for_rate(rate_hz, bits),
        }
    }

    fn timebase_interval_ns(&self, timebase: u32, bits: u8) -> Option<f64> {
        match self.clock {
            Some(clock) => Some(clock.interval_ns(timebase)),
            None => self.base.timebase_interval_ns(timebase, bits),
        }
    }

    fn candidate_timebases(&self, bits: u8) -> &'static [u32] {
        match self.clock {
            Some(clock) => clock.candidates(),
            None => self.base.candidate_timebases(bits),
        }
    }

    fn nominal_interval_ns(&self, timebase: u32) -> Option<f64> {
        self.base.nominal_interval_ns(timebase)
    }

    fn depth_probe_timebase(&self) -> u32 {
        self.base.depth_probe_timebase()
    }

    fn memory_samples(&self) -> u64 {
        self.base.memory_samples()
    }

    fn pod_threshold_full_scale(&self) -> f64 {
        self.base.pod_threshold_full_scale()
    }

    fn per_lane_thresholds(&self) -> bool {
        self.base.per_lane_thresholds()
    }

    fn supports_hysteresis(&self) -> bool {
        self.base.supports_hysteresis()
    }

    fn generator_buffer_len(&self) -> usize {
        self.generator_buffer_len
    }

    fn native_generator_stop(&self) -> bool {
        self.base.native_generator_stop()
    }

    fn native_duty_cycle(&self) -> bool {
        self.base.native_duty_cycle()
    }

    fn generator_pauses_acquisition(&self) -> bool {
        self.base.generator_pauses_acquisition()
    }

    fn adc_full_scale_code(&self, bits: u8) -> i16 {
        self.base.adc_full_scale_code(bits)
    }

    fn pod_threshold_code(&self, volts: f64) -> i16 {
        self.base.pod_threshold_code(volts)
    }
}

// =============================================================================
// PicoScope 2000A
// =============================================================================

/// PicoScope 2000A series (1 GS/s models).
#[derive(Debug, Clone, Copy, Default)]
pub struct Series2000A;

impl InstrumentFamily for Series2000A {
    fn name(&self) -> &'static str {
        "2000a"
    }

    fn default_model(&self) -> &'static str {
        "2406B"
    }

    fn default_analog_channels(&self) -> usize {
        4
    }

    fn default_digital_pods(&self) -> usize {
        0
    }

    fn range_ladder(&self) -> &'static [f64] {
        LEGACY_LADDER
    }

    fn supports_fifty_ohm(&self) -> bool {
        false
    }

    fn bandwidth_limits_mhz(&self) -> &'static [u32] {
        &[]
    }

    fn resolutions(&self) -> &'static [u8] {
        &[8]
    }

    fn timebase_for_rate(&self, rate_hz: u64, _bits: u8) -> u32 {
        Clock::Gigasample.timebase_for_rate(rate_hz)
    }

    fn timebase_interval_ns(&self, timebase: u32, _bits: u8) -> Option<f64> {
        Some(Clock::Gigasample.interval_ns(timebase))
    }

    fn candidate_timebases(&self, _bits: u8) -> &'static [u32] {
        Clock::Gigasample.candidates()
    }

    fn memory_samples(&self) -> u64 {
        32_000_000
    }

    fn pod_threshold_full_scale(&self) -> f64 {
        5.0
    }

    fn per_lane_thresholds(&self) -> bool {
        false
    }

    fn supports_hysteresis(&self) -> bool {
        false
    }

    fn generator_buffer_len(&self) -> usize {
        8192
    }

    fn native_generator_stop(&self) -> bool {
        false
    }

    fn native_duty_cycle(&self) -> bool {
        false
    }

    fn generator_pauses_acquisition(&self) -> bool {
        true
    }
}

// =============================================================================
// PicoScope 3000A/3000D
// =============================================================================

/// PicoScope 3000A/B/D series (4-channel USB 3.0 and MSO models).
#[derive(Debug, Clone, Copy, Default)]
pub struct Series3000A;

impl InstrumentFamily for Series3000A {
    fn name(&self) -> &'static str {
        "3000a"
    }

    fn default_model(&self) -> &'static str {
        "3406DMSO"
    }

    fn default_analog_channels(&self) -> usize {
        4
    }

    fn default_digital_pods(&self) -> usize {
        2
    }

    fn range_ladder(&self) -> &'static [f64] {
        LEGACY_LADDER
    }

    fn supports_fifty_ohm(&self) -> bool {
        false
    }

    fn bandwidth_limits_mhz(&self) -> &'static [u32] {
        &[20]
    }

    fn resolutions(&self) -> &'static [u8] {
        &[8]
    }

    fn timebase_for_rate(&self, rate_hz: u64, _bits: u8) -> u32 {
        Clock::Gigasample.timebase_for_rate(rate_hz)
    }

    fn timebase_interval_ns(&self, timebase: u32, _bits: u8) -> Option<f64> {
        Some(Clock::Gigasample.interval_ns(timebase))
    }

    fn candidate_timebases(&self, _bits: u8) -> &'static [u32] {
        Clock::Gigasample.candidates()
    }

    fn memory_samples(&self) -> u64 {
        512_000_000
    }

    fn pod_threshold_full_scale(&self) -> f64 {
        5.0
    }

    fn per_lane_thresholds(&self) -> bool {
        false
    }

    fn supports_hysteresis(&self) -> bool {
        false
    }

    fn generator_buffer_len(&self) -> usize {
        32768
    }

    fn native_generator_stop(&self) -> bool {
        false
    }

    fn native_duty_cycle(&self) -> bool {
        false
    }

    fn generator_pauses_acquisition(&self) -> bool {
        true
    }
}

// =============================================================================
// PicoScope 4000A
// =============================================================================

const LADDER_4000A: &[f64] = &[
    0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0,
];

/// PicoScope 4000A series (4824 and other 80 MS/s, 12 bit models).
#[derive(Debug, Clone, Copy, Default)]
pub struct Series4000A;

impl InstrumentFamily for Series4000A {
    fn name(&self) -> &'static str {
        "4000a"
    }

    fn default_model(&self) -> &'static str {
        "4824"
    }

    fn default_analog_channels(&self) -> usize {
        8
    }

    fn default_digital_pods(&self) -> usize {
        0
    }

    fn range_ladder(&self) -> &'static [f64] {
        LADDER_4000A
    }

    fn supports_fifty_ohm(&self) -> bool {
        false
    }

    fn bandwidth_limits_mhz(&self) -> &'static [u32] {
        &[1]
    }

    fn resolutions(&self) -> &'static [u8] {
        &[12]
    }

    fn timebase_for_rate(&self, rate_hz: u64, _bits: u8) -> u32 {
        Clock::Ps4000.timebase_for_rate(rate_hz)
    }

    fn timebase_interval_ns(&self, timebase: u32, _bits: u8) -> Option<f64> {
        Some(Clock::Ps4000.interval_ns(timebase))
    }

    fn candidate_timebases(&self, _bits: u8) -> &'static [u32] {
        Clock::Ps4000.candidates()
    }

    fn memory_samples(&self) -> u64 {
        256_000_000
    }

    fn pod_threshold_full_scale(&self) -> f64 {
        5.0
    }

    fn per_lane_thresholds(&self) -> bool {
        false
    }

    fn supports_hysteresis(&self) -> bool {
        false
    }

    fn generator_buffer_len(&self) -> usize {
        16384
    }

    fn native_generator_stop(&self) -> bool {
        false
    }

    fn native_duty_cycle(&self) -> bool {
        false
    }

    fn generator_pauses_acquisition(&self) -> bool {
        true
    }
}

/// PicoScope 4444 (400 MS/s differential, 12/14 bit).
#[derive(Debug, Clone, Copy, Default)]
pub struct Series4444;

impl InstrumentFamily for Series4444 {
    fn name(&self) -> &'static str {
        "4000a"
    }

    fn default_model(&self) -> &'static str {
        "4444"
    }

    fn default_analog_channels(&self) -> usize {
        4
    }

    fn default_digital_pods(&self) -> usize {
        0
    }

    fn range_ladder(&self) -> &'static [f64] {
        LADDER_4000A
    }

    fn supports_fifty_ohm(&self) -> bool {
        false
    }

    // 100 selects the 100 kHz filter
    fn bandwidth_limits_mhz(&self) -> &'static [u32] {
        &[1, 100]
    }

    fn resolutions(&self) -> &'static [u8] {
        &[12, 14]
    }

    fn timebase_for_rate(&self, rate_hz: u64, _bits: u8) -> u32 {
        Clock::Ps4444.timebase_for_rate(rate_hz)
    }

    fn timebase_interval_ns(&self, timebase: u32, _bits: u8) -> Option<f64> {
        Some(Clock::Ps4444.interval_ns(timebase))
    }

    fn candidate_timebases(&self, _bits: u8) -> &'static [u32] {
        Clock::Ps4444.candidates()
    }

    fn memory_samples(&self) -> u64 {
        256_000_000
    }

    fn pod_threshold_full_scale(&self) -> f64 {
        5.0
    }

    fn per_lane_thresholds(&self) -> bool {
        false
    }

    fn supports_hysteresis(&self) -> bool {
        false
    }

    fn generator_buffer_len(&self) -> usize {
        16384
    }

    fn native_generator_stop(&self) -> bool {
        false
    }

    fn native_duty_cycle(&self) -> bool {
        false
    }

    fn generator_pauses_acquisition(&self) -> bool {
        true
    }
}

// =============================================================================
// PicoScope 5000A/5000D (flexible resolution)
// =============================================================================

/// PicoScope 5000A/B/D series with 8 to 16 bit flexible resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Series5000A;

const TIMEBASES_5000A_12BIT: &[u32] = &[
    1, 2, 3, 4, 5, 7, 8, 11, 13, 23, 28, 43, 53, 83, 103, 128, 203, 253, 403, 503, 628, 803, 1003,
    1253, 2003, 2503, 4003, 5003, 6253, 8003, 10003, 12503, 20003, 25003, 40003, 50003, 62503,
];

const TIMEBASES_5000A_14BIT: &[u32] = &[
    3, 4, 6, 7, 10, 12, 18, 22, 27, 42, 52, 82, 102, 127, 162, 202, 252, 402, 502, 802, 1002, 1252,
    1602, 2002, 2502, 4002, 5002, 8002, 10002, 12502, 16002, 20002, 25002, 40002, 50002, 80002,
    100002, 125002,
];

const TIMEBASES_5000A_16BIT: &[u32] = &[
    4, 5, 7, 8, 11, 13, 23, 28, 43, 53, 83, 103, 128, 203, 253, 403, 503, 628, 803, 1003, 1253,
    2003, 2503, 4003, 5003, 6253, 8003, 10003, 12503, 20003, 25003, 40003, 50003, 62503,
];

impl InstrumentFamily for Series5000A {
    fn name(&self) -> &'static str {
        "5000a"
    }

    fn default_model(&self) -> &'static str {
        "5444D"
    }

    fn default_analog_channels(&self) -> usize {
        4
    }

    fn default_digital_pods(&self) -> usize {
        0
    }

    fn range_ladder(&self) -> &'static [f64] {
        &[0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0]
    }

    fn supports_fifty_ohm(&self) -> bool {
        false
    }

    fn bandwidth_limits_mhz(&self) -> &'static [u32] {
        &[20]
    }

    fn resolutions(&self) -> &'static [u8] {
        &[8, 12, 14, 15, 16]
    }

    fn timebase_for_rate(&self, rate_hz: u64, bits: u8) -> u32 {
        let rate = rate_hz.max(1) as f64;
        let period = period_ns(rate_hz);
        match bits {
            12 => {
                if period < 4.0 {
                    1
                } else if period < 16.0 {
                    round_index((5e8 / rate).log2() + 1.0)
                } else {
                    round_index(62.5e6 / rate + 3.0)
                }
            }
            14 | 15 => {
                if period < 16.0 {
                    3
                } else {
                    round_index(125e6 / rate + 2.0)
                }
            }
            16 => {
                if period < 32.0 {
                    4
                } else {
                    round_index(62.5e6 / rate + 3.0)
                }
            }
            _ => Clock::Gigasample.timebase_for_rate(rate_hz),
        }
    }

    fn timebase_interval_ns(&self, timebase: u32, bits: u8) -> Option<f64> {
        match bits {
            12 => match timebase {
                0 => None,
                1..=3 => Some(f64::from(1u32 << timebase)),
                _ => Some(f64::from(timebase - 3) * 16.0),
            },
            14 | 15 => match timebase {
                0..=2 => None,
                _ => Some(f64::from(timebase - 2) * 8.0),
            },
            16 => match timebase {
                0..=3 => None,
                _ => Some(f64::from(timebase - 3) * 16.0),
            },
            _ => Some(Clock::Gigasample.interval_ns(timebase)),
        }
    }

    fn candidate_timebases(&self, bits: u8) -> &'static [u32] {
        match bits {
            12 => TIMEBASES_5000A_12BIT,
            14 | 15 => TIMEBASES_5000A_14BIT,
            16 => TIMEBASES_5000A_16BIT,
            _ => Clock::Gigasample.candidates(),
        }
    }

    fn memory_samples(&self) -> u64 {
        512_000_000
    }

    fn pod_threshold_full_scale(&self) -> f64 {
        5.0
    }

    fn per_lane_thresholds(&self) -> bool {
        false
    }

    fn supports_hysteresis(&self) -> bool {
        false
    }

    fn generator_buffer_len(&self) -> usize {
        32768
    }

    fn native_generator_stop(&self) -> bool {
        false
    }

    fn native_duty_cycle(&self) -> bool {
        false
    }

    fn generator_pauses_acquisition(&self) -> bool {
        true
    }
}

// =============================================================================
// PicoScope 6000E
// =============================================================================

/// PicoScope 6000E series (5 GS/s, 8/10/12 bit).
#[derive(Debug, Clone, Copy, Default)]
pub struct Series6000E;

impl InstrumentFamily for Series6000E {
    fn name(&self) -> &'static str {
        "6000e"
    }

    fn default_model(&self) -> &'static str {
        "6424E"
    }

    fn default_analog_channels(&self) -> usize {
        4
    }

    fn default_digital_pods(&self) -> usize {
        2
    }

    fn range_ladder(&self) -> &'static [f64] {
        &[
            0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0,
        ]
    }

    fn supports_fifty_ohm(&self) -> bool {
        true
    }

    fn bandwidth_limits_mhz(&self) -> &'static [u32] {
        &[20, 200]
    }

    fn resolutions(&self) -> &'static [u8] {
        &[8, 10, 12]
    }

    fn timebase_for_rate(&self, rate_hz: u64, _bits: u8) -> u32 {
        Clock::Ps6000E.timebase_for_rate(rate_hz)
    }

    fn timebase_interval_ns(&self, timebase: u32, _bits: u8) -> Option<f64> {
        Some(Clock::Ps6000E.interval_ns(timebase))
    }

    fn candidate_timebases(&self, _bits: u8) -> &'static [u32] {
        Clock::Ps6000E.candidates()
    }

    fn memory_samples(&self) -> u64 {
        4_000_000_000
    }

    fn pod_threshold_full_scale(&self) -> f64 {
        8.0
    }

    fn per_lane_thresholds(&self) -> bool {
        true
    }

    fn supports_hysteresis(&self) -> bool {
        true
    }

    fn generator_buffer_len(&self) -> usize {
        40960
    }

    fn native_generator_stop(&self) -> bool {
        true
    }

    fn native_duty_cycle(&self) -> bool {
        true
    }

    fn generator_pauses_acquisition(&self) -> bool {
        false
    }
}

// =============================================================================
// PicoScope 3000E
// =============================================================================

/// PicoScope 3000E series. Timebase indices are sample periods in picoseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Series3000E;

impl InstrumentFamily for Series3000E {
    fn name(&self) -> &'static str {
        "3000e"
    }

    fn default_model(&self) -> &'static str {
        "3417E"
    }

    fn default_analog_channels(&self) -> usize {
        4
    }

    fn default_digital_pods(&self) -> usize {
        2
    }

    fn range_ladder(&self) -> &'static [f64] {
        &[
            0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0,
        ]
    }

    fn supports_fifty_ohm(&self) -> bool {
        true
    }

    fn bandwidth_limits_mhz(&self) -> &'static [u32] {
        &[20, 50, 100, 200, 350]
    }

    fn resolutions(&self) -> &'static [u8] {
        &[8, 10]
    }

    fn timebase_for_rate(&self, rate_hz: u64, _bits: u8) -> u32 {
        round_index(period_ns(rate_hz) * 1000.0)
    }

    fn timebase_interval_ns(&self, timebase: u32, _bits: u8) -> Option<f64> {
        if timebase < 200 {
            None
        } else {
            Some(f64::from(timebase) / 1000.0)
        }
    }

    fn candidate_timebases(&self, _bits: u8) -> &'static [u32] {
        &[
            200, 400, 800, 1600, 3200, 6400, 12800, 16000, 20000, 32000, 40000, 64000, 80000,
            100000, 128000, 160000, 200000, 320000, 400000, 640000, 800000, 1000000, 1280000,
            1600000, 2000000, 3200000, 4000000, 6400000, 8000000, 10000000, 12800000, 16000000,
            20000000, 32000000, 40000000, 64000000, 80000000, 100000000, 128000000, 160000000,
            200000000, 320000000, 400000000, 640000000, 800000000, 1000000000,
        ]
    }

    fn nominal_interval_ns(&self, timebase: u32) -> Option<f64> {
        Some(f64::from(timebase) / 1000.0)
    }

    fn depth_probe_timebase(&self) -> u32 {
        40000
    }

    fn memory_samples(&self) -> u64 {
        2_000_000_000
    }

    fn pod_threshold_full_scale(&self) -> f64 {
        8.0
    }

    fn per_lane_thresholds(&self) -> bool {
        true
    }

    fn supports_hysteresis(&self) -> bool {
        true
    }

    fn generator_buffer_len(&self) -> usize {
        8192
    }

    fn native_generator_stop(&self) -> bool {
        true
    }

    fn native_duty_cycle(&self) -> bool {
        true
    }

    fn generator_pauses_acquisition(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_resolves() {
        for name in FAMILY_NAMES {
            let family = family_by_name(name).unwrap();
            assert_eq!(family.name(), *name);
        }
        assert!(family_by_name("6000E").is_some());
        assert!(family_by_name("7000x").is_none());
    }

    #[test]
    fn ladders_are_strictly_increasing() {
        for name in FAMILY_NAMES {
            let family = family_by_name(name).unwrap();
            let ladder = family.range_ladder();
            assert!(!ladder.is_empty());
            assert!(ladder.windows(2).all(|w| w[0] < w[1]), "{name}");
        }
    }

    #[test]
    fn gigasample_closed_form() {
        let family = Series2000A;
        assert_eq!(family.timebase_for_rate(2_000_000_000, 8), 0);
        assert_eq!(family.timebase_for_rate(1_000_000_000, 8), 0);
        assert_eq!(family.timebase_for_rate(500_000_000, 8), 1);
        assert_eq!(family.timebase_for_rate(250_000_000, 8), 2);
        // 100 MS/s -> 10 ns -> 125e6/1e8 + 2
        assert_eq!(family.timebase_for_rate(100_000_000, 8), 3);
        assert_eq!(family.timebase_for_rate(1_000_000, 8), 127);
        assert_eq!(family.timebase_interval_ns(127, 8), Some(1000.0));
    }

    #[test]
    fn flexible_resolution_changes_timebase() {
        let family = Series5000A;
        assert_eq!(family.timebase_for_rate(1_000_000_000, 12), 1);
        assert_eq!(family.timebase_for_rate(1_000_000_000, 14), 3);
        assert_eq!(family.timebase_for_rate(1_000_000_000, 16), 4);
        assert_eq!(family.timebase_interval_ns(0, 12), None);
        assert_eq!(family.timebase_interval_ns(4, 16), Some(16.0));
        assert_eq!(family.candidate_timebases(16)[0], 4);
    }

    #[test]
    fn six_thousand_e_clock_divider() {
        let family = Series6000E;
        assert_eq!(family.timebase_for_rate(5_000_000_000, 8), 0);
        assert_eq!(family.timebase_for_rate(1_250_000_000, 8), 2);
        // 1 MS/s -> 1000 ns / 0.2 = 5000 / 32 = 156.25 -> 156 + 4
        assert_eq!(family.timebase_for_rate(1_000_000, 8), 160);
        assert_eq!(family.timebase_interval_ns(2, 8), Some(0.8));
        assert_eq!(family.timebase_interval_ns(160, 8).map(|ns| ns.round()), Some(998.0));
    }

    #[test]
    fn picosecond_timebases() {
        let family = Series3000E;
        assert_eq!(family.timebase_for_rate(1_000_000_000, 8), 1000);
        assert_eq!(family.timebase_interval_ns(199, 8), None);
        assert_eq!(family.nominal_interval_ns(16000), Some(16.0));
    }

    #[test]
    fn candidate_intervals_increase_for_every_clock() {
        for clock in [
            Clock::Gigasample,
            Clock::HalfGigasample,
            Clock::Mso2205,
            Clock::Usb2Mso,
            Clock::Ps4444,
            Clock::Ps4000,
            Clock::Ps6000E,
            Clock::Ps6428E,
        ] {
            let intervals: Vec<f64> = clock
                .candidates()
                .iter()
                .map(|tb| clock.interval_ns(*tb))
                .collect();
            assert!(intervals.windows(2).all(|w| w[0] < w[1]), "{clock:?}");
        }
    }

    #[test]
    fn closed_forms_land_on_matching_intervals() {
        // (clock, rate, expected timebase, expected interval)
        let cases = [
            (Clock::HalfGigasample, 500_000_000, 0, 2.0),
            (Clock::HalfGigasample, 250_000_000, 1, 4.0),
            (Clock::HalfGigasample, 62_500_000, 3, 16.0),
            (Clock::Mso2205, 200_000_000, 0, 5.0),
            (Clock::Mso2205, 1_000_000, 100, 1000.0),
            (Clock::Usb2Mso, 250_000_000, 1, 4.0),
            (Clock::Usb2Mso, 62_500_000, 3, 16.0),
            (Clock::Ps4444, 400_000_000, 0, 2.5),
            (Clock::Ps4444, 100_000_000, 2, 10.0),
            (Clock::Ps4444, 25_000_000, 4, 40.0),
            (Clock::Ps4000, 80_000_000, 0, 12.5),
            (Clock::Ps4000, 1_000_000, 79, 1000.0),
            (Clock::Ps6428E, 10_000_000_000, 0, 0.1),
            (Clock::Ps6428E, 1_250_000_000, 3, 0.8),
        ];
        for (clock, rate, timebase, interval) in cases {
            assert_eq!(clock.timebase_for_rate(rate), timebase, "{clock:?} {rate}");
            assert!((clock.interval_ns(timebase) - interval).abs() < 1e-9, "{clock:?} {rate}");
        }
        // faster than the part can sample truncates to the first index
        assert_eq!(Clock::Ps4000.timebase_for_rate(1_000_000_000), 0);
        assert_eq!(
            Clock::Ps6428E.timebase_for_rate(1_000_000),
            Clock::Ps6000E.timebase_for_rate(1_000_000) + 1
        );
    }

    #[test]
    fn model_selects_sub_model_clock() {
        let cases = [
            ("2000a", "2206B", Some(Clock::HalfGigasample)),
            ("2000a", "2405A", Some(Clock::HalfGigasample)),
            ("2000a", "2205MSO", Some(Clock::Mso2205)),
            ("2000a", "2406B", None),
            ("3000a", "3205B", Some(Clock::HalfGigasample)),
            ("3000a", "3204MSO", Some(Clock::Usb2Mso)),
            ("3000a", "3406DMSO", None),
            ("6000e", "6428E-D", Some(Clock::Ps6428E)),
            ("6000e", "6424E", None),
        ];
        for (family, model, clock) in cases {
            let profile = family_for_model(family, Some(model)).unwrap();
            let expected = clock.map_or_else(
                || family_by_name(family).unwrap().candidate_timebases(8),
                Clock::candidates,
            );
            assert_eq!(profile.candidate_timebases(8), expected, "{model}");
        }
    }

    #[test]
    fn model_number_sets_channels_pods_and_buffer() {
        let two_channel = family_for_model("2000a", Some("2206B")).unwrap();
        assert_eq!(two_channel.default_analog_channels(), 2);
        assert_eq!(two_channel.default_digital_pods(), 0);

        let mso = family_for_model("3000a", Some("3406DMSO")).unwrap();
        assert_eq!(mso.default_analog_channels(), 4);
        assert_eq!(mso.default_digital_pods(), 2);
        assert_eq!(
            family_for_model("3000a", Some("3405D")).unwrap().default_digital_pods(),
            0
        );

        assert_eq!(
            family_for_model("3000a", Some("3206B")).unwrap().generator_buffer_len(),
            16384
        );
        assert_eq!(
            family_for_model("5000a", Some("5244B")).unwrap().generator_buffer_len(),
            49152
        );

        let eight = family_for_model("4000a", Some("4824")).unwrap();
        assert_eq!(eight.default_analog_channels(), 8);
        assert_eq!(eight.resolutions(), &[12]);
        let differential = family_for_model("4000a", Some("4444")).unwrap();
        assert_eq!(differential.default_analog_channels(), 4);
        assert_eq!(differential.resolutions(), &[12, 14]);
        assert_eq!(differential.timebase_for_rate(400_000_000, 12), 0);

        // no model leaves the family untouched
        assert_eq!(family_for_model("6000e", None).unwrap().default_model(), "6424E");
        assert!(family_for_model("9000z", Some("9404")).is_none());
    }

    #[test]
    fn pod_threshold_code_scales_with_family() {
        assert_eq!(Series3000A.pod_threshold_code(2.5), 16384);
        assert_eq!(Series6000E.pod_threshold_code(2.0), 8192);
        assert_eq!(Series6000E.pod_threshold_code(100.0), 32767);
    }
}
