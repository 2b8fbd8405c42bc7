use psramp_config::{DeviceKind, load_path, load_toml};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

const MINIMAL: &str = r#"
[scan]
start = 0.0
stop = 1.0
step = 0.5
"#;

#[test]
fn minimal_config_uses_documented_defaults() {
    let cfg = load_toml(MINIMAL).expect("parse TOML");
    cfg.validate().expect("minimal config is valid");

    let s = &cfg.settle;
    assert_eq!(s.pre_wait_s, 3.0);
    assert_eq!(s.hold_s, 2.0);
    assert_eq!(s.tol, 0.02);
    assert_eq!(s.base_timeout, 5.0);
    assert_eq!(s.dwell, 0.1);
    assert_eq!(s.stable_time, 0.4);
    assert_eq!(s.max_time, 10.0);
    assert_eq!(cfg.device.kind, DeviceKind::Sim);
    assert!(cfg.scan.extra_channels.is_empty());
}

#[test]
fn missing_scan_section_fails_to_parse() {
    let err = load_toml("[settle]\ntol = 0.1\n").expect_err("scan is required");
    assert!(err.to_string().contains("scan"));
}

#[rstest]
#[case("start = 0.0\nstop = 1.0\nstep = 0.0", "scan.step must be finite and non-zero")]
#[case("start = 0.0\nstop = 1.0\nstep = nan", "scan.step must be finite and non-zero")]
#[case("start = inf\nstop = 1.0\nstep = 0.5", "scan.start and scan.stop must be finite")]
fn rejects_bad_scan_ranges(#[case] body: &str, #[case] needle: &str) {
    let text = format!("[scan]\n{body}\n");
    let cfg = load_toml(&text).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        err.to_string().contains(needle),
        "unexpected message: {err}"
    );
}

#[rstest]
#[case("dwell = 0.0", "settle.dwell must be a finite value > 0")]
#[case("tol = -0.01", "settle.tol must be a finite value >= 0")]
#[case("max_time = 0.0", "settle.max_time must be a finite value > 0")]
#[case("hold_s = -1.0", "settle.hold_s must be a finite value >= 0")]
#[case("pre_wait_s = -0.5", "settle.pre_wait_s must be a finite value >= 0")]
#[case("stable_time = 7200.0", "unreasonably large")]
#[case("pre_wait_s = 1e300", "settle.pre_wait_s is unreasonably large")]
#[case("hold_s = 1e300", "settle.hold_s is unreasonably large")]
#[case("base_timeout = 3601.0", "settle.base_timeout is unreasonably large")]
#[case("max_time = 1e20", "settle.max_time is unreasonably large")]
#[case("dwell = 4000.0", "settle.dwell is unreasonably large")]
fn rejects_bad_settle_values(#[case] line: &str, #[case] needle: &str) {
    let text = format!("{MINIMAL}\n[settle]\n{line}\n");
    let cfg = load_toml(&text).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        err.to_string().contains(needle),
        "unexpected message: {err}"
    );
}

#[test]
fn zero_tolerance_is_accepted() {
    let text = format!("{MINIMAL}\n[settle]\ntol = 0.0\n");
    let cfg = load_toml(&text).expect("parse TOML");
    cfg.validate().expect("exact-match tolerance is the caller's choice");
}

#[test]
fn scpi_requires_port() {
    let text = format!("{MINIMAL}\n[device]\nkind = \"scpi\"\n");
    let cfg = load_toml(&text).expect("parse TOML");
    let err = cfg.validate().expect_err("port required");
    assert!(err.to_string().contains("device.port is required"));

    let text = format!("{MINIMAL}\n[device]\nkind = \"scpi\"\nport = \"/dev/ttyUSB0\"\n");
    load_toml(&text).expect("parse").validate().expect("valid");
}

#[rstest]
#[case("slew_rate = 0.5", None)]
#[case("slew_rate = 0.0", Some("device.slew_rate must be a finite value > 0"))]
#[case("slew_rate = -1.0", Some("device.slew_rate must be a finite value > 0"))]
#[case("slew_rate = inf", Some("device.slew_rate must be a finite value > 0"))]
fn device_slew_rate_must_be_positive(#[case] line: &str, #[case] needle: Option<&str>) {
    let cfg = load_toml(&format!("{MINIMAL}
[device]
{line}
")).expect("parse");
    match needle {
        None => {
            cfg.validate().expect("valid");
            assert_eq!(cfg.device.slew_rate, Some(0.5));
        }
        Some(n) => {
            let err = cfg.validate().expect_err("should reject");
            assert!(err.to_string().contains(n), "unexpected message: {err}");
        }
    }
}

#[test]
fn rejects_unknown_rotation() {
    let text = format!("{MINIMAL}\n[logging]\nrotation = \"weekly\"\n");
    let err = load_toml(&text)
        .expect("parse")
        .validate()
        .expect_err("weekly is not supported");
    assert!(err.to_string().contains("logging.rotation"));
}

#[test]
fn extra_channels_and_sim_section_parse() {
    let text = r#"
[scan]
start = 2.0
stop = 0.0
step = -0.25
extra_channels = ["voltage", "heatsink_temp"]

[sim]
slew_rate = 4.0
reported_slew_rate = 0.0
virtual_time = true
"#;
    let cfg = load_toml(text).expect("parse");
    cfg.validate().expect("valid");
    assert_eq!(cfg.scan.extra_channels, vec!["voltage", "heatsink_temp"]);
    assert_eq!(cfg.sim.reported_slew_rate, Some(0.0));
    assert!(cfg.sim.virtual_time);
}

#[test]
fn load_path_reads_and_validates() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.toml");
    fs::write(&good, MINIMAL).unwrap();
    let cfg = load_path(&good).expect("load");
    assert_eq!(cfg.scan.step, 0.5);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, MINIMAL.replace("step = 0.5", "step = 0.0")).unwrap();
    assert!(load_path(&bad).is_err());

    assert!(load_path(&dir.path().join("missing.toml")).is_err());
}
