//! Range, timebase and depth quantization.
//!
//! Turns continuous client requests into the discrete values hardware accepts,
//! and builds the `RATES?`/`DEPTHS?` lists by probing the capability layer.

use crate::error::StatusClass;
use crate::hardware::{Coupling, ScopeDriver};
use tracing::warn;

/// Femtoseconds per second; sample intervals are kept in femtoseconds.
pub const FS_PER_SECOND: u64 = 1_000_000_000_000_000;

/// Highest range allowed into a 50 Ω termination, volts.
pub const FIFTY_OHM_RANGE_CEILING: f64 = 5.0;

/// Smallest entry of the depth progression.
pub const MIN_DEPTH: u64 = 1000;

/// Accepted drift between a probed interval and its nominal value, ns.
const NOMINAL_INTERVAL_TOLERANCE_NS: f64 = 0.001;

/// Smallest ladder entry at or above `requested`, or the top of the ladder.
///
/// With 50 Ω coupling the request is first capped to
/// [`FIFTY_OHM_RANGE_CEILING`].
pub fn quantize_range(ladder: &[f64], requested: f64, coupling: Coupling) -> f64 {
    let effective = if coupling.is_fifty_ohm() {
        requested.min(FIFTY_OHM_RANGE_CEILING)
    } else {
        requested
    };

    ladder
        .iter()
        .copied()
        .find(|step| *step >= effective)
        .or_else(|| ladder.last().copied())
        .unwrap_or(effective)
}

/// Sample interval in femtoseconds for a rate, `None` for 0 Hz.
pub fn interval_fs_for_rate(rate_hz: u64) -> Option<u64> {
    FS_PER_SECOND.checked_div(rate_hz)
}

/// Clamp an offset into the hardware window.
pub fn clamp_offset(requested: f64, (min, max): (f64, f64)) -> f64 {
    requested.clamp(min, max)
}

/// Convert a trigger level to a raw ADC code for a channel's frontend.
///
/// The fractional code is truncated toward zero.
pub fn trigger_code(level: f64, offset: f64, rounded_range: f64, full_scale_code: i16) -> i16 {
    let mut volts_per_code = rounded_range / f64::from(full_scale_code);
    if volts_per_code == 0.0 {
        volts_per_code = 1.0;
    }
    let code = ((level - offset) / volts_per_code).trunc();
    code.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Trigger delay expressed in samples (sign preserved).
pub fn delay_in_samples(delay_fs: i64, interval_fs: u64) -> i64 {
    match i64::try_from(interval_fs) {
        Ok(interval) if interval > 0 => delay_fs / interval,
        _ => 0,
    }
}

/// Split a record into (pre-trigger, post-trigger) sample counts.
pub fn split_record(delay_samples: i64, depth: u64) -> (u64, u64) {
    let pre = u64::try_from(delay_samples).unwrap_or(0).min(depth);
    (pre, depth - pre)
}

/// 1-2-5 progression from [`MIN_DEPTH`] below `max`, with `max` appended.
pub fn depth_series(max: u64) -> Vec<u64> {
    let mut depths = Vec::new();
    let mut decade = MIN_DEPTH;
    'outer: loop {
        for mantissa in [1, 2, 5] {
            let Some(depth) = decade.checked_mul(mantissa) else {
                break 'outer;
            };
            if depth >= max {
                break 'outer;
            }
            depths.push(depth);
        }
        match decade.checked_mul(10) {
            Some(next) => decade = next,
            None => break,
        }
    }
    depths.push(max);
    depths
}

/// Probe every candidate timebase and list the achievable rates in Hz.
///
/// Invalid timebase/channel combinations are expected and skipped silently.
/// Intervals that drift from the family's nominal value, or repeat the
/// previous one, are dropped.
pub fn enumerate_rates(driver: &mut dyn ScopeDriver, resolution_bits: u8) -> Vec<u64> {
    let candidates = driver.family().candidate_timebases(resolution_bits);
    let mut rates = Vec::with_capacity(candidates.len());
    let mut previous_interval_ns: Option<f64> = None;

    for &timebase in candidates {
        let info = match driver.get_timebase(timebase) {
            Ok(info) => info,
            Err(err) if err.classify() == StatusClass::EnumerationGap => continue,
            Err(err) => {
                warn!(timebase, code = err.code(), error = %err, "get_timebase failed");
                continue;
            }
        };

        if let Some(nominal) = driver.family().nominal_interval_ns(timebase) {
            if (info.interval_ns - nominal).abs() > NOMINAL_INTERVAL_TOLERANCE_NS {
                continue;
            }
        }
        if previous_interval_ns
            .is_some_and(|prev| (prev - info.interval_ns).abs() < NOMINAL_INTERVAL_TOLERANCE_NS)
        {
            continue;
        }
        previous_interval_ns = Some(info.interval_ns);

        let interval_fs = (info.interval_ns * 1e6).round() as u64;
        if let Some(rate) = FS_PER_SECOND.checked_div(interval_fs) {
            rates.push(rate);
        }
    }
    rates
}

/// Memory depths offered at the current channel configuration.
pub fn enumerate_depths(driver: &mut dyn ScopeDriver) -> Vec<u64> {
    let timebase = driver.family().depth_probe_timebase();
    match driver.get_timebase(timebase) {
        Ok(info) => depth_series(info.max_samples),
        Err(err) => {
            if err.classify() != StatusClass::EnumerationGap {
                warn!(timebase, code = err.code(), error = %err, "depth probe failed");
            }
            Vec::new()
        }
    }
}
