use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use psramp_hardware::{HwError, SimulatedSupply};
use psramp_traits::{CurrentSource, ManualClock, READBACK_FIELD};
use rstest::rstest;

fn channels(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[rstest]
#[case(None, 1.5)]
#[case(Some(0.0), 0.0)]
#[case(Some(-3.0), -3.0)]
fn reported_slew_rate_can_be_overridden(#[case] reported: Option<f64>, #[case] expected: f64) {
    let clock = ManualClock::new();
    let mut ps = SimulatedSupply::new(Arc::new(clock))
        .with_slew_rate(1.5)
        .with_reported_slew_rate(reported);
    assert_eq!(ps.read_slew_rate().unwrap(), expected);
}

#[test]
fn failing_slew_read_surfaces_timeout() {
    let mut ps = SimulatedSupply::new(Arc::new(ManualClock::new())).with_failing_slew_read(true);
    let err = ps.read_slew_rate().expect_err("injected");
    assert!(matches!(
        err.downcast_ref::<HwError>(),
        Some(HwError::Timeout)
    ));
}

#[test]
fn measurement_contains_readback_and_known_extras_only() {
    let clock = ManualClock::new();
    let mut ps = SimulatedSupply::new(Arc::new(clock.clone())).with_slew_rate(10.0);
    ps.power_on().unwrap();
    ps.command(2.0).unwrap();
    clock.advance(Duration::from_secs(1));

    let fields = ps
        .trigger_measurement(&channels(&["voltage", "shunt_temp", "bogus"]))
        .unwrap();
    assert_eq!(fields[READBACK_FIELD], 2.0);
    assert!((fields["voltage"] - 1.0).abs() < 1e-9);
    assert!(fields["shunt_temp"] > 25.0);
    assert!(!fields.contains_key("bogus"));
}

#[test]
fn snapshot_reports_done_once_ramp_finished() {
    let clock = ManualClock::new();
    let mut ps = SimulatedSupply::new(Arc::new(clock.clone())).with_slew_rate(1.0);
    ps.power_on().unwrap();
    ps.command(1.0).unwrap();

    let mid = ps.snapshot().unwrap();
    assert_eq!(mid["done"], 0.0);
    assert_eq!(mid["powered"], 1.0);

    clock.advance(Duration::from_secs(2));
    let end = ps.snapshot().unwrap();
    assert_eq!(end["done"], 1.0);
    assert_eq!(end[READBACK_FIELD], 1.0);
}

#[test]
fn power_off_drops_output_and_records_nothing_else() {
    let clock = ManualClock::new();
    let mut ps = SimulatedSupply::new(Arc::new(clock.clone())).with_slew_rate(5.0);
    ps.power_on().unwrap();
    ps.command(1.0).unwrap();
    clock.advance(Duration::from_secs(1));
    ps.power_off().unwrap();
    assert!(!ps.is_powered());
    assert_eq!(ps.read_back().unwrap(), 0.0);
    assert_eq!(ps.commanded(), &[1.0]);
    assert_eq!(ps.power_on_count(), 1);
}

#[test]
fn failing_command_is_reported() {
    let mut ps = SimulatedSupply::new(Arc::new(ManualClock::new())).with_failing_command(true);
    ps.power_on().unwrap();
    let err = ps.command(1.0).expect_err("injected");
    assert!(err.to_string().contains("command write failed"));
    assert!(ps.commanded().is_empty());
}

#[test]
fn programmed_slew_rate_drives_the_ramp() {
    let clock = ManualClock::new();
    let mut ps = SimulatedSupply::new(Arc::new(clock.clone())).with_slew_rate(1.0);
    ps.set_slew_rate(4.0).unwrap();
    ps.power_on().unwrap();
    ps.command(2.0).unwrap();
    clock.advance(Duration::from_millis(250));
    assert!((ps.read_back().unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(ps.read_slew_rate().unwrap(), 4.0);
    assert_eq!(ps.snapshot().unwrap()["slew_rate_set"], 4.0);
}

#[rstest]
#[case(0.0)]
#[case(-2.0)]
#[case(f64::INFINITY)]
fn out_of_range_slew_rate_is_refused(#[case] rate: f64) {
    let mut ps = SimulatedSupply::new(Arc::new(ManualClock::new())).with_slew_rate(1.5);
    let err = ps.set_slew_rate(rate).expect_err("refused");
    assert!(matches!(
        err.downcast_ref::<HwError>(),
        Some(HwError::Protocol(_))
    ));
    assert_eq!(ps.read_slew_rate().unwrap(), 1.5);
}
