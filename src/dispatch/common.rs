use super::request::{number, signed, unsigned};
use super::{list_reply, CommandSet, Context, Outcome};
use crate::addressing::{ChannelKey, Subject};
use crate::hardware::{Coupling, EdgeDirection};
use crate::instrument::Instrument;

/// Shared bridge surface: identification, channels, timing, trigger and
/// acquisition.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonCommands;

impl CommandSet for CommonCommands {
    fn name(&self) -> &'static str {
        "common"
    }

    fn handle(&self, ctx: &Context<'_>, instrument: &mut Instrument) -> Outcome {
        let request = ctx.request;
        match (ctx.subject, request.is_query) {
            (None, true) => query(request.command.as_str(), instrument),
            (None, false) => global_command(ctx, instrument),
            (Some(Subject::Channel(key)), false) => channel_command(ctx, key, instrument),
            (Some(Subject::Trigger), false) => trigger_command(ctx, instrument),
            _ => Outcome::NotHandled,
        }
    }
}

fn query(command: &str, instrument: &mut Instrument) -> Outcome {
    match command {
        "*IDN" => Outcome::reply(instrument.identity().to_string()),
        "CHANS" => Outcome::reply(instrument.analog_channel_count().to_string()),
        "RATES" => Outcome::reply(list_reply(&instrument.sample_rates())),
        "DEPTHS" => Outcome::reply(list_reply(&instrument.sample_depths())),
        _ => Outcome::NotHandled,
    }
}

fn global_command(ctx: &Context<'_>, instrument: &mut Instrument) -> Outcome {
    let request = ctx.request;
    if request.no_args() {
        match request.command.as_str() {
            "START" => instrument.start(false),
            "SINGLE" => instrument.start(true),
            "FORCE" => instrument.force_trigger(),
            "STOP" => instrument.stop(),
            _ => return Outcome::NotHandled,
        }
        return Outcome::done();
    }

    let Some(arg) = request.single_arg() else {
        return Outcome::NotHandled;
    };
    match request.command.as_str() {
        "RATE" => unsigned(arg).map_or(Outcome::NotHandled, |rate| {
            Outcome::applied(instrument.set_sample_rate(rate))
        }),
        "DEPTH" => unsigned(arg).map_or(Outcome::NotHandled, |depth| {
            Outcome::applied(instrument.set_depth(depth))
        }),
        _ => Outcome::NotHandled,
    }
}

fn channel_command(ctx: &Context<'_>, key: ChannelKey, instrument: &mut Instrument) -> Outcome {
    let request = ctx.request;
    if request.no_args() {
        return match request.command.as_str() {
            "ON" => Outcome::applied(instrument.set_channel_enabled(key, true)),
            "OFF" => Outcome::applied(instrument.set_channel_enabled(key, false)),
            _ => Outcome::NotHandled,
        };
    }

    let Some(arg) = request.single_arg() else {
        return Outcome::NotHandled;
    };
    match (request.command.as_str(), key) {
        ("COUP", ChannelKey::Analog(index)) => match Coupling::from_token(arg) {
            Some(coupling) => {
                instrument.set_coupling(index, coupling);
                Outcome::done()
            }
            None => Outcome::NotHandled,
        },
        ("OFFS", ChannelKey::Analog(index)) => number(arg).map_or(Outcome::NotHandled, |volts| {
            instrument.set_offset(index, volts);
            Outcome::done()
        }),
        ("RANGE", ChannelKey::Analog(index)) => number(arg).map_or(Outcome::NotHandled, |volts| {
            instrument.set_range(index, volts);
            Outcome::done()
        }),
        // digital lanes share views with analog channels; range has no meaning there
        ("RANGE", ChannelKey::Digital { .. }) => Outcome::done(),
        ("THRESH", ChannelKey::Digital { pod, lane }) => {
            number(arg).map_or(Outcome::NotHandled, |millivolts| {
                Outcome::applied(instrument.set_pod_threshold(pod, lane, millivolts / 1000.0))
            })
        }
        ("HYS", ChannelKey::Digital { pod, .. }) => {
            number(arg).map_or(Outcome::NotHandled, |millivolts| {
                instrument.set_pod_hysteresis(pod, millivolts);
                Outcome::done()
            })
        }
        _ => Outcome::NotHandled,
    }
}

fn trigger_command(ctx: &Context<'_>, instrument: &mut Instrument) -> Outcome {
    let Some(arg) = ctx.request.single_arg() else {
        return Outcome::NotHandled;
    };
    match ctx.request.command.as_str() {
        "DELAY" => signed(arg).map_or(Outcome::NotHandled, |fs| {
            instrument.set_trigger_delay(fs);
            Outcome::done()
        }),
        "LEV" => number(arg).map_or(Outcome::NotHandled, |volts| {
            instrument.set_trigger_level(volts);
            Outcome::done()
        }),
        "SOU" => ctx.resolver.channel(arg).map_or(Outcome::NotHandled, |key| {
            instrument.set_trigger_source(key);
            Outcome::done()
        }),
        "EDGE:DIR" => EdgeDirection::from_token(arg).map_or(Outcome::NotHandled, |dir| {
            instrument.set_trigger_direction(dir);
            Outcome::done()
        }),
        // edge is the only trigger type
        "MODE" if arg == "EDGE" => Outcome::done(),
        _ => Outcome::NotHandled,
    }
}

#[cfg(test)]
mod tests {
    use crate::addressing::ChannelKey;
    use crate::dispatch::{Dispatcher, Outcome};
    use crate::hardware::family::{Series2000A, Series6000E};
    use crate::hardware::{Coupling, EdgeDirection, InstrumentFamily};
    use crate::hardware::sim::SimulatedScope;
    use crate::instrument::Instrument;

    fn dispatcher(family: Box<dyn InstrumentFamily>) -> Dispatcher {
        let scope = SimulatedScope::builder(family).serial("GX123/0042").build();
        Dispatcher::new(Instrument::new(Box::new(scope)).into_shared())
    }

    #[test]
    fn identification_queries() {
        let d = dispatcher(Box::new(Series6000E));
        let Outcome::Handled(Some(idn)) = d.dispatch_line("*IDN?") else {
            panic!("no IDN reply");
        };
        assert!(idn.starts_with("Pico Technology,6424E,GX123/0042,"));
        assert_eq!(d.dispatch_line("CHANS?"), Outcome::reply("4"));
    }

    #[test]
    fn channel_commands_update_state() {
        let d = dispatcher(Box::new(Series6000E));
        assert_eq!(d.dispatch_line("B:ON"), Outcome::done());
        assert_eq!(d.dispatch_line("B:COUP AC1M"), Outcome::done());
        assert_eq!(d.dispatch_line("B:OFFS 0.1"), Outcome::done());
        let inst = d.instrument().lock();
        let channel = &inst.state().channels[1];
        assert!(channel.enabled);
        assert_eq!(channel.coupling, Coupling::Ac1M);
        assert_eq!(channel.offset, 0.1);
    }

    #[test]
    fn malformed_arguments_are_not_handled() {
        let d = dispatcher(Box::new(Series6000E));
        assert_eq!(d.dispatch_line("A:RANGE"), Outcome::NotHandled);
        assert_eq!(d.dispatch_line("A:RANGE 1 2"), Outcome::NotHandled);
        assert_eq!(d.dispatch_line("A:RANGE lots"), Outcome::NotHandled);
        assert_eq!(d.dispatch_line("A:COUP GND"), Outcome::NotHandled);
        assert_eq!(d.dispatch_line("RATE"), Outcome::NotHandled);
        assert_eq!(d.dispatch_line("TRIG:EDGE:DIR SIDEWAYS"), Outcome::NotHandled);
    }

    #[test]
    fn range_on_digital_subject_is_ignored() {
        let d = dispatcher(Box::new(Series6000E));
        assert_eq!(d.dispatch_line("1D3:RANGE 5"), Outcome::done());
    }

    #[test]
    fn trigger_commands() {
        let d = dispatcher(Box::new(Series6000E));
        assert_eq!(d.dispatch_line("TRIG:SOU C"), Outcome::done());
        assert_eq!(d.dispatch_line("TRIG:EDGE:DIR ANY"), Outcome::done());
        assert_eq!(d.dispatch_line("TRIG:LEV 0.3"), Outcome::done());
        assert_eq!(d.dispatch_line("TRIG:DELAY 5000000"), Outcome::done());
        assert_eq!(d.dispatch_line("TRIG:MODE EDGE"), Outcome::done());
        assert_eq!(d.dispatch_line("TRIG:MODE PULSE"), Outcome::NotHandled);

        let inst = d.instrument().lock();
        let trigger = &inst.state().trigger;
        assert_eq!(trigger.source, ChannelKey::Analog(2));
        assert_eq!(trigger.direction, EdgeDirection::Any);
        assert_eq!(trigger.level, 0.3);
        assert_eq!(trigger.delay_fs, 5_000_000);
    }

    #[test]
    fn rate_and_depth() {
        let d = dispatcher(Box::new(Series2000A));
        assert_eq!(d.dispatch_line("RATE 4000000000"), Outcome::done());
        assert_eq!(d.dispatch_line("DEPTH 50000"), Outcome::done());
        assert_eq!(d.dispatch_line("RATE 0"), Outcome::NotHandled);
        let inst = d.instrument().lock();
        assert_eq!(inst.state().timing.timebase, 0);
        assert_eq!(inst.state().timing.depth, 50_000);
    }

    #[test]
    fn pod_threshold_is_millivolts() {
        let d = dispatcher(Box::new(Series6000E));
        assert_eq!(d.dispatch_line("2D4:THRESH 2000"), Outcome::done());
        let inst = d.instrument().lock();
        assert_eq!(inst.state().pods[1].threshold_volts, 2.0);
        assert_eq!(inst.state().pods[1].thresholds[4], 8192);
    }
}
