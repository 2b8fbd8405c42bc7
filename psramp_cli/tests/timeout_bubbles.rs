use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[rstest]
fn settle_timeout_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    let toml = r#"
[scan]
start = 0.0
stop = 2.0
step = 1.0

[settle]
pre_wait_s = 0.0
hold_s = 0.0
base_timeout = 1.0

[sim]
slew_rate = 0.001
reported_slew_rate = 1.0
virtual_time = true
"#;
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, toml).unwrap();

    let mut cmd = Command::cargo_bin("psramp").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--log-level")
        .arg("error")
        .arg("scan");
    cmd.assert()
        .code(3)
        .stdout(predicate::str::contains("scan stopped after 1/3 setpoints"))
        .stderr(predicate::str::contains(
            "What happened: The readback did not settle",
        ));
}

#[rstest]
fn zero_reported_slew_still_scans() {
    let dir = tempdir().unwrap();
    let toml = r#"
[scan]
start = 0.0
stop = 0.2
step = 0.1

[settle]
pre_wait_s = 0.0
hold_s = 0.0

[sim]
slew_rate = 0.5
reported_slew_rate = 0.0
virtual_time = true
"#;
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, toml).unwrap();

    let mut cmd = Command::cargo_bin("psramp").unwrap();
    cmd.arg("--config").arg(&cfg).arg("scan");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("(fallback slew)"))
        .stdout(predicate::str::contains("scan complete: 3/3"));
}

#[rstest]
fn one_shot_settle_is_bounded_by_max_time() {
    let dir = tempdir().unwrap();
    let toml = r#"
[scan]
start = 0.0
stop = 1.0
step = 1.0

[settle]
max_time = 1.5

[sim]
slew_rate = 0.001
virtual_time = true
"#;
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, toml).unwrap();

    let mut cmd = Command::cargo_bin("psramp").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("settle")
        .arg("1.0");
    let out = cmd.assert().code(3).get_output().clone();
    let err_line = String::from_utf8_lossy(&out.stderr)
        .lines()
        .rev()
        .find(|l| l.contains("\"reason\""))
        .map(str::to_owned)
        .expect("structured error on stderr");
    let v: serde_json::Value = serde_json::from_str(&err_line).unwrap();
    assert_eq!(v["reason"], "SettleTimeout");
    let elapsed = v["details"]["elapsed_ms"].as_u64().unwrap();
    assert!(elapsed > 1_500 && elapsed <= 1_600, "elapsed {elapsed}");
}

#[rstest]
fn device_slew_rate_is_programmed_into_the_sim() {
    let dir = tempdir().unwrap();
    let toml = r#"
[scan]
start = 0.0
stop = 1.0
step = 1.0

[settle]
pre_wait_s = 0.0
hold_s = 0.0

[device]
slew_rate = 4.0

[sim]
slew_rate = 0.001
virtual_time = true
"#;
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, toml).unwrap();

    let mut cmd = Command::cargo_bin("psramp").unwrap();
    cmd.arg("--config").arg(&cfg).arg("scan");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("scan complete: 2/2"));
}
