//! Function generator reconfiguration.
//!
//! Every field change re-issues the complete generator configuration. Families
//! without a native stop get a synthesized one (zero amplitude and offset,
//! apply, restore), and families without a native duty cycle play square
//! waves from the arbitrary buffer.

use crate::hardware::{GeneratorWaveform, WaveShape};
use crate::instrument::{logged, Instrument};
use tracing::debug;

/// Lowest generator frequency, Hz.
pub const MIN_FREQUENCY_HZ: f64 = 1e-3;

/// Arbitrary-buffer sample value for the high level of a square wave.
const SQUARE_HIGH: i16 = 32767;
const SQUARE_LOW: i16 = -32767;

/// Fill `buffer` with one period of a two-level signal.
///
/// The high-sample count is truncated, not rounded.
pub fn fill_square(buffer: &mut [i16], duty_percent: f64) {
    let duty = duty_percent.clamp(0.0, 100.0);
    let high = ((buffer.len() as f64 * duty) / 100.0) as usize;
    let (first, second) = buffer.split_at_mut(high.min(buffer.len()));
    first.fill(SQUARE_HIGH);
    second.fill(SQUARE_LOW);
}

impl Instrument {
    /// Start or stop generator output.
    pub fn set_generator_enabled(&mut self, enabled: bool) {
        if enabled {
            self.state.generator.enabled = true;
            self.reconfigure_generator();
        } else {
            self.stop_generator();
        }
    }

    /// Stop output and leave a clean zero level.
    pub fn stop_generator(&mut self) {
        if self.driver.family().native_generator_stop() {
            self.state.generator.enabled = false;
            self.reconfigure_generator();
            return;
        }

        let generator = &mut self.state.generator;
        let (range, offset) = (generator.range, generator.offset);
        generator.range = 0.0;
        generator.offset = 0.0;
        self.reconfigure_generator();

        let generator = &mut self.state.generator;
        generator.range = range;
        generator.offset = offset;
        generator.enabled = false;
        debug!(range, offset, "generator stopped, settings restored");
    }

    /// Output frequency in Hz; values below 1 mHz are raised to it.
    pub fn set_generator_frequency(&mut self, hz: f64) {
        let hz = if hz.is_finite() { hz } else { MIN_FREQUENCY_HZ };
        self.state.generator.frequency_hz = hz.max(MIN_FREQUENCY_HZ);
        self.reconfigure_generator();
    }

    /// Duty cycle as a fraction (`0.25` is 25 %).
    pub fn set_generator_duty(&mut self, fraction: f64) {
        let generator = &mut self.state.generator;
        generator.duty_percent = (fraction * 100.0).clamp(0.0, 100.0);
        if generator.shape != WaveShape::Square {
            debug!(shape = ?generator.shape, "duty cycle applies to square waves only");
        }
        self.refresh_square_buffer();
        self.reconfigure_generator();
    }

    /// DC offset in volts.
    pub fn set_generator_offset(&mut self, volts: f64) {
        self.state.generator.offset = volts;
        self.reconfigure_generator();
    }

    /// Peak-to-peak amplitude in volts.
    pub fn set_generator_range(&mut self, volts: f64) {
        self.state.generator.range = volts;
        self.reconfigure_generator();
    }

    /// Select the output waveform.
    pub fn set_generator_shape(&mut self, shape: WaveShape) {
        self.state.generator.shape = shape;
        self.refresh_square_buffer();
        self.reconfigure_generator();
    }

    fn synthesized_square(&self) -> bool {
        self.state.generator.shape == WaveShape::Square
            && !self.driver.family().native_duty_cycle()
    }

    fn refresh_square_buffer(&mut self) {
        if self.synthesized_square() {
            let generator = &mut self.state.generator;
            fill_square(&mut generator.arbitrary, generator.duty_percent);
        }
    }

    /// Push the full generator configuration.
    pub(crate) fn reconfigure_generator(&mut self) {
        let pauses = self.driver.family().generator_pauses_acquisition();
        if pauses {
            self.stop_hardware();
        }

        let native_duty = self.driver.family().native_duty_cycle();
        let native_stop = self.driver.family().native_generator_stop();
        let generator = &self.state.generator;
        let waveform = match generator.shape {
            WaveShape::Arbitrary => GeneratorWaveform::Arbitrary(&generator.arbitrary),
            WaveShape::Square if !native_duty => GeneratorWaveform::Arbitrary(&generator.arbitrary),
            WaveShape::Square => GeneratorWaveform::BuiltIn {
                shape: WaveShape::Square,
                duty_percent: Some(generator.duty_percent),
            },
            shape => GeneratorWaveform::BuiltIn {
                shape,
                duty_percent: None,
            },
        };
        // without a native stop the output is silenced by zero amplitude
        let (range, offset) = if generator.enabled || native_stop {
            (generator.range, generator.offset)
        } else {
            (0.0, 0.0)
        };
        let (enabled, frequency_hz) = (generator.enabled, generator.frequency_hz);

        logged(
            "set_generator_waveform",
            self.driver.set_generator_waveform(waveform),
        );
        logged(
            "set_generator_range",
            self.driver.set_generator_range(range, offset),
        );
        logged(
            "apply_generator",
            self.driver.apply_generator(enabled, frequency_hz),
        );

        if pauses && self.state.trigger.armed {
            self.start_capture(false, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::ChannelKey;
    use crate::hardware::family::{Series2000A, Series6000E};
    use crate::hardware::sim::{HwCall, SimProbe, SimulatedScope};
    use crate::error::HardwareError;
    use crate::hardware::InstrumentFamily;
    use tracing_test::traced_test;

    fn instrument(family: Box<dyn InstrumentFamily>) -> (Instrument, SimProbe) {
        let scope = SimulatedScope::builder(family).build();
        let probe = scope.probe();
        (Instrument::new(Box::new(scope)), probe)
    }

    fn ranges(probe: &SimProbe) -> Vec<(f64, f64)> {
        probe
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                HwCall::SetGeneratorRange {
                    peak_to_peak,
                    offset,
                } => Some((peak_to_peak, offset)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn square_fill_truncates() {
        let mut buffer = [0i16; 10];
        fill_square(&mut buffer, 25.0);
        assert_eq!(buffer.iter().filter(|s| **s > 0).count(), 2);
        assert_eq!(buffer[2], SQUARE_LOW);

        let mut buffer = vec![0i16; 8192];
        fill_square(&mut buffer, 33.3);
        assert_eq!(buffer.iter().filter(|s| **s > 0).count(), 2727);
    }

    #[test]
    fn square_fill_extremes() {
        let mut buffer = [0i16; 16];
        fill_square(&mut buffer, 0.0);
        assert!(buffer.iter().all(|s| *s == SQUARE_LOW));
        fill_square(&mut buffer, 150.0);
        assert!(buffer.iter().all(|s| *s == SQUARE_HIGH));
    }

    #[test]
    fn synthesized_stop_restores_range_and_offset() {
        let (mut inst, probe) = instrument(Box::new(Series2000A));
        inst.set_generator_range(1.5);
        inst.set_generator_offset(0.2);
        inst.set_generator_enabled(true);
        probe.clear();

        inst.stop_generator();

        let generator = &inst.state().generator;
        assert!(!generator.enabled);
        assert_eq!(generator.range, 1.5);
        assert_eq!(generator.offset, 0.2);
        assert_eq!(ranges(&probe), vec![(0.0, 0.0)]);
    }

    #[test]
    fn native_stop_only_reconfigures() {
        let (mut inst, probe) = instrument(Box::new(Series6000E));
        inst.set_generator_range(2.0);
        inst.set_generator_enabled(true);
        probe.clear();
        inst.set_generator_enabled(false);
        assert_eq!(
            probe.last(|c| matches!(c, HwCall::ApplyGenerator { .. })),
            Some(HwCall::ApplyGenerator {
                on: false,
                frequency_hz: 1000.0
            })
        );
        assert_eq!(inst.state().generator.range, 2.0);
    }

    #[test]
    fn frequency_is_never_zero() {
        let (mut inst, _probe) = instrument(Box::new(Series6000E));
        inst.set_generator_frequency(0.0);
        assert_eq!(inst.state().generator.frequency_hz, MIN_FREQUENCY_HZ);
        inst.set_generator_frequency(f64::NAN);
        assert!(inst.state().generator.frequency_hz > 0.0);
        inst.set_generator_frequency(2.5e6);
        assert_eq!(inst.state().generator.frequency_hz, 2.5e6);
    }

    #[test]
    fn legacy_square_duty_uses_arbitrary_buffer() {
        let (mut inst, probe) = instrument(Box::new(Series2000A));
        inst.set_generator_shape(WaveShape::Square);
        inst.set_generator_duty(0.25);
        assert_eq!(inst.state().generator.duty_percent, 25.0);
        assert_eq!(
            probe.last(|c| matches!(c, HwCall::SetGeneratorArbitrary { .. })),
            Some(HwCall::SetGeneratorArbitrary {
                len: 8192,
                high_samples: 2048
            })
        );
    }

    #[test]
    fn native_duty_is_sent_with_builtin_square() {
        let (mut inst, probe) = instrument(Box::new(Series6000E));
        inst.set_generator_shape(WaveShape::Square);
        inst.set_generator_duty(0.25);
        assert_eq!(
            probe.last(|c| matches!(c, HwCall::SetGeneratorBuiltIn { .. })),
            Some(HwCall::SetGeneratorBuiltIn {
                shape: WaveShape::Square,
                duty_percent: Some(25.0)
            })
        );
        assert_eq!(probe.count(|c| matches!(c, HwCall::SetGeneratorArbitrary { .. })), 0);
    }

    #[test]
    fn disabled_generator_outputs_zero_amplitude() {
        let (mut inst, probe) = instrument(Box::new(Series2000A));
        inst.set_generator_range(3.0);
        assert_eq!(ranges(&probe).last(), Some(&(0.0, 0.0)));
        inst.set_generator_enabled(true);
        assert_eq!(ranges(&probe).last(), Some(&(3.0, 0.0)));
    }

    #[test]
    fn native_stop_family_keeps_amplitude_while_disabled() {
        let (mut inst, sim) = instrument(Box::new(Series6000E));
        inst.set_generator_range(3.0);
        inst.set_generator_offset(0.5);
        assert!(!inst.state().generator.enabled);
        assert_eq!(ranges(&sim).last(), Some(&(3.0, 0.5)));
        assert_eq!(
            sim.last(|c| matches!(c, HwCall::ApplyGenerator { .. })),
            Some(HwCall::ApplyGenerator {
                on: false,
                frequency_hz: 1000.0
            })
        );
    }

    #[test]
    #[traced_test]
    fn waveform_failure_is_logged_and_reconfiguration_continues() {
        let (mut inst, sim) = instrument(Box::new(Series6000E));
        sim.inject(
            "set_generator_waveform",
            HardwareError::Failure { code: 0x4d },
        );
        sim.clear();
        inst.set_generator_range(2.0);
        assert!(logs_contain("set_generator_waveform"));
        assert_eq!(ranges(&sim), vec![(2.0, 0.0)]);
        assert_eq!(sim.count(|c| matches!(c, HwCall::ApplyGenerator { .. })), 1);
    }

    #[test]
    fn legacy_generator_change_resumes_armed_capture() {
        let (mut inst, probe) = instrument(Box::new(Series2000A));
        inst.set_sample_rate(500_000_000);
        inst.set_channel_enabled(ChannelKey::Analog(0), true);
        inst.start(false);
        probe.clear();

        inst.set_generator_frequency(10_000.0);

        let calls = probe.calls();
        assert_eq!(calls.first(), Some(&HwCall::Stop));
        assert!(matches!(calls.last(), Some(HwCall::RunBlock { .. })));
        assert!(inst.state().trigger.armed);
    }
}
