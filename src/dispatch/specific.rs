use super::request::unsigned;
use super::{CommandSet, Context, Outcome};
use crate::addressing::{ChannelKey, Subject};
use crate::hardware::Coupling;
use crate::instrument::Instrument;

/// Oscilloscope extras beyond the shared surface: ADC resolution, bandwidth
/// limiters, pod presence, and frontend readback.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentCommands;

impl CommandSet for InstrumentCommands {
    fn name(&self) -> &'static str {
        "instrument"
    }

    fn handle(&self, ctx: &Context<'_>, instrument: &mut Instrument) -> Outcome {
        let request = ctx.request;
        let command = request.command.as_str();

        match ctx.subject {
            None if command == "BITS" && !request.is_query => {
                let Some(bits) = request.single_arg().and_then(unsigned) else {
                    return Outcome::NotHandled;
                };
                // rejected values are logged by the instrument and leave state alone
                instrument.set_resolution(u8::try_from(bits).unwrap_or(u8::MAX));
                Outcome::done()
            }
            Some(Subject::Channel(key)) if request.is_query => channel_query(command, key, instrument),
            Some(Subject::Channel(ChannelKey::Analog(index))) if command == "BWLIM" => {
                let Some(mhz) = request.single_arg().and_then(unsigned) else {
                    return Outcome::NotHandled;
                };
                instrument.set_bandwidth_limit(index, u32::try_from(mhz).unwrap_or(0));
                Outcome::done()
            }
            _ => Outcome::NotHandled,
        }
    }
}

fn channel_query(command: &str, key: ChannelKey, instrument: &mut Instrument) -> Outcome {
    match (command, key) {
        ("PRESENT", ChannelKey::Digital { pod, .. }) => {
            let present = instrument.pod_present(pod);
            Outcome::reply(if present { "1" } else { "0" })
        }
        (_, ChannelKey::Analog(index)) => {
            let Some(channel) = instrument.state().channels.get(index) else {
                return Outcome::NotHandled;
            };
            match command {
                "BWLIM" => Outcome::reply(channel.bandwidth.as_mhz().to_string()),
                "RANGE" => Outcome::reply(channel.rounded_range.to_string()),
                "OFFS" => Outcome::reply(channel.offset.to_string()),
                "COUP" => Outcome::reply(coupling_token(channel.coupling)),
                _ => Outcome::NotHandled,
            }
        }
        _ => Outcome::NotHandled,
    }
}

fn coupling_token(coupling: Coupling) -> &'static str {
    match coupling {
        Coupling::Dc1M => "DC1M",
        Coupling::Ac1M => "AC1M",
        Coupling::Dc50 => "DC50",
    }
}

#[cfg(test)]
mod tests {
    use crate::dispatch::{Dispatcher, Outcome};
    use crate::hardware::family::{Series2000A, Series3000A, Series6000E};
    use crate::hardware::sim::SimulatedScope;
    use crate::hardware::{BandwidthLimit, InstrumentFamily};
    use crate::instrument::Instrument;

    fn dispatcher(family: Box<dyn InstrumentFamily>) -> Dispatcher {
        let scope = SimulatedScope::builder(family).build();
        Dispatcher::new(Instrument::new(Box::new(scope)).into_shared())
    }

    #[test]
    fn range_readback_reports_rounded_value() {
        let d = dispatcher(Box::new(Series2000A));
        assert_eq!(d.dispatch_line("A:RANGE 7"), Outcome::done());
        assert_eq!(d.dispatch_line("A:RANGE?"), Outcome::reply("10"));
    }

    #[test]
    fn bandwidth_limit_round_trip() {
        let d = dispatcher(Box::new(Series6000E));
        assert_eq!(d.dispatch_line("B:BWLIM?"), Outcome::reply("0"));
        assert_eq!(d.dispatch_line("B:BWLIM 200"), Outcome::done());
        assert_eq!(d.dispatch_line("B:BWLIM?"), Outcome::reply("200"));
        d.dispatch_line("B:BWLIM 42");
        assert_eq!(
            d.instrument().lock().state().channels[1].bandwidth,
            BandwidthLimit::Full
        );
    }

    #[test]
    fn pod_presence() {
        let scope = SimulatedScope::builder(Box::new(Series3000A))
            .attached_pods(vec![true, false])
            .build();
        let d = Dispatcher::new(Instrument::new(Box::new(scope)).into_shared());
        assert_eq!(d.dispatch_line("1D:PRESENT?"), Outcome::reply("1"));
        assert_eq!(d.dispatch_line("2D:PRESENT?"), Outcome::reply("0"));
    }

    #[test]
    fn unsupported_bits_change_nothing() {
        let d = dispatcher(Box::new(Series6000E));
        assert_eq!(d.dispatch_line("BITS 10"), Outcome::done());
        assert_eq!(d.dispatch_line("BITS 14"), Outcome::done());
        assert_eq!(
            d.instrument().lock().state().timing.resolution_bits,
            10
        );
        assert_eq!(d.dispatch_line("BITS"), Outcome::NotHandled);
    }
}
