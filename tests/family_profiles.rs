//! Every supported family behind the same dispatcher.

use scope_bridge::dispatch::{Dispatcher, Outcome};
use scope_bridge::hardware::family::{family_by_name, family_for_model, FAMILY_NAMES};
use scope_bridge::hardware::sim::SimulatedScope;
use scope_bridge::instrument::Instrument;

fn dispatcher(name: &str) -> Dispatcher {
    let family = family_by_name(name).unwrap();
    let scope = SimulatedScope::builder(family).build();
    Dispatcher::new(Instrument::new(Box::new(scope)).into_shared())
}

fn model_dispatcher(name: &str, model: &str) -> Dispatcher {
    let family = family_for_model(name, Some(model)).unwrap();
    let scope = SimulatedScope::builder(family).model(model).build();
    Dispatcher::new(Instrument::new(Box::new(scope)).into_shared())
}

fn reply(outcome: Outcome) -> String {
    match outcome {
        Outcome::Handled(Some(text)) => text,
        other => panic!("expected a reply, got {other:?}"),
    }
}

fn parse_list(text: &str) -> Vec<u64> {
    assert!(text.ends_with(','), "list must be comma-terminated: {text}");
    text.trim_end_matches(',')
        .split(',')
        .map(|v| v.parse().unwrap())
        .collect()
}

#[test]
fn test_rates_are_strictly_decreasing_for_every_family() {
    for name in FAMILY_NAMES {
        let rates = parse_list(&reply(dispatcher(name).dispatch_line("RATES?")));
        assert!(!rates.is_empty(), "{name}: no rates");
        assert!(
            rates.windows(2).all(|w| w[0] > w[1]),
            "{name}: rates not strictly decreasing: {rates:?}"
        );
    }
}

#[test]
fn test_depths_follow_one_two_five() {
    for name in FAMILY_NAMES {
        let depths = parse_list(&reply(dispatcher(name).dispatch_line("DEPTHS?")));
        assert_eq!(depths[..3], [1000, 2000, 5000], "{name}");
        // the last entry is the probed maximum itself
        let (last, progression) = depths.split_last().unwrap();
        for pair in progression.windows(2) {
            let ratio = pair[1] as f64 / pair[0] as f64;
            assert!(ratio == 2.0 || ratio == 2.5, "{name}: {pair:?}");
        }
        assert!(progression.iter().all(|d| d < last), "{name}: {depths:?}");
    }
}

#[test]
fn test_identity_has_four_fields() {
    for name in FAMILY_NAMES {
        let idn = reply(dispatcher(name).dispatch_line("*IDN?"));
        assert_eq!(idn.split(',').count(), 4, "{name}: {idn}");
    }
}

#[test]
fn test_fifty_ohm_coupling_caps_range() {
    let d = dispatcher("6000e");
    d.dispatch_line("A:RANGE 20");
    d.dispatch_line("A:COUP DC50");
    assert_eq!(d.dispatch_line("A:COUP?"), Outcome::reply("DC50"));
    assert_eq!(d.dispatch_line("A:RANGE?"), Outcome::reply("5"));

    // families without 50 ohm inputs keep their coupling
    let legacy = dispatcher("2000a");
    legacy.dispatch_line("A:COUP DC50");
    assert_eq!(legacy.dispatch_line("A:COUP?"), Outcome::reply("DC1M"));
}

#[test]
fn test_sub_models_report_their_own_rates() {
    let models = [
        ("2000a", "2205MSO", 200_000_000),
        ("2000a", "2206B", 500_000_000),
        ("3000a", "3205B", 500_000_000),
        ("3000a", "3204MSO", 500_000_000),
        ("4000a", "4444", 400_000_000),
        ("4000a", "4824", 80_000_000),
        ("6000e", "6428E-D", 10_000_000_000),
    ];
    for (name, model, fastest) in models {
        let rates = parse_list(&reply(model_dispatcher(name, model).dispatch_line("RATES?")));
        assert_eq!(rates[0], fastest, "{model}: {rates:?}");
        assert!(
            rates.windows(2).all(|w| w[0] > w[1]),
            "{model}: rates not strictly decreasing: {rates:?}"
        );
    }
}

#[test]
fn test_model_number_sets_channel_count() {
    let d = model_dispatcher("3000a", "3205B");
    // two channels: letters past B clamp to the last channel
    d.dispatch_line("D:RANGE 2");
    assert_eq!(d.dispatch_line("B:RANGE?"), Outcome::reply("2"));
    let idn = reply(d.dispatch_line("*IDN?"));
    assert!(idn.contains("3205B"), "{idn}");
}
