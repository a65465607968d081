use super::request::number;
use super::{CommandSet, Context, Outcome};
use crate::addressing::Subject;
use crate::hardware::WaveShape;
use crate::instrument::Instrument;
use tracing::error;

/// `AWG:*` commands for the function generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorCommands;

impl CommandSet for GeneratorCommands {
    fn name(&self) -> &'static str {
        "generator"
    }

    fn handle(&self, ctx: &Context<'_>, instrument: &mut Instrument) -> Outcome {
        let request = ctx.request;
        if ctx.subject != Some(Subject::Generator) || request.is_query {
            return Outcome::NotHandled;
        }

        if request.no_args() {
            return match request.command.as_str() {
                "START" => {
                    instrument.set_generator_enabled(true);
                    Outcome::done()
                }
                "STOP" => {
                    instrument.stop_generator();
                    Outcome::done()
                }
                _ => Outcome::NotHandled,
            };
        }

        let Some(arg) = request.single_arg() else {
            return Outcome::NotHandled;
        };
        if request.command == "SHAPE" {
            match WaveShape::from_token(arg) {
                Some(shape) => instrument.set_generator_shape(shape),
                None => error!(shape = arg, "invalid waveform type"),
            }
            return Outcome::done();
        }

        let Some(value) = number(arg) else {
            return Outcome::NotHandled;
        };
        match request.command.as_str() {
            "FREQ" => instrument.set_generator_frequency(value),
            "DUTY" => instrument.set_generator_duty(value),
            "OFFS" => instrument.set_generator_offset(value),
            "RANGE" => instrument.set_generator_range(value),
            _ => return Outcome::NotHandled,
        }
        Outcome::done()
    }
}
