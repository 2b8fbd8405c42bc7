//! Human-readable error descriptions, exit codes and structured JSON errors.

use crate::cli::LAST_SETTLE;
use crate::scan::abort_reason_name;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use psramp_core::error::{BuildError, RampError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSource => {
                "What happened: No current source was provided to the scan.\nLikely causes: The device failed to open or was not wired into the builder.\nHow to fix: Check the [device] section and that the device opens with `psramp self-check`.".to_string()
            }
            BuildError::MissingRange => {
                "What happened: No scan range was set.\nLikely causes: The [scan] section is missing start/stop/step.\nHow to fix: Add [scan] start, stop and step to the config or pass --start/--stop/--step.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RampError>() {
        return match re {
            RampError::SettleTimeout {
                target,
                tolerance,
                elapsed,
            } => format!(
                "What happened: The readback did not settle within ±{tolerance} of {target} after {:.1} s.\nLikely causes: Output disabled or load disconnected, tolerance tighter than the readback noise, or a device slewing slower than it reports.\nHow to fix: Check the output with `psramp status`, widen settle.tol, or raise settle.base_timeout (settle.max_time for `psramp settle`).",
                elapsed.as_secs_f64()
            ),
            RampError::Interrupted => "What happened: The scan was interrupted.\nLikely causes: Ctrl-C was pressed.\nHow to fix: Start a new scan; the device stays at its last commanded setpoint.".to_string(),
            RampError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Zero or non-finite step, negative tolerance, or a zero dwell.\nHow to fix: Edit [scan]/[settle] in the config or the command-line overrides."
            ),
            RampError::Hardware(msg) | RampError::HardwareFault(msg) => format!(
                "What happened: Device communication failed ({msg}).\nLikely causes: Cable unplugged, wrong serial port or baud rate, or the output is disabled.\nHow to fix: Verify [device] port/baud, run `psramp self-check`, and retry."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open serial port") {
        return "What happened: Failed to open the serial port.\nLikely causes: Wrong device.port, the port is in use, or insufficient permissions.\nHow to fix: Fix [device] port in the config; ensure the process may access the port.".to_string();
    }

    if lower.contains("invalid configuration") {
        let mut cause = String::new();
        if let Some(src) = err.source() {
            cause = format!(" ({src})");
        }
        return format!(
            "What happened: Configuration is invalid or incomplete{cause}.\nLikely causes: Wrong --config path, missing [scan] section, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn is_config_error(err: &eyre::Report) -> bool {
    use psramp_core::error::BuildError;
    if err.downcast_ref::<BuildError>().is_some() {
        return true;
    }
    err.to_string()
        .to_ascii_lowercase()
        .contains("invalid configuration")
}

/// Stable exit codes: interrupted 2, settle timeout 3, config 4, hardware 5, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use psramp_core::error::RampError;
    if let Some(re) = err.downcast_ref::<RampError>() {
        return match re {
            RampError::Interrupted => 2,
            RampError::SettleTimeout { .. } => 3,
            RampError::Config(_) => 4,
            RampError::Hardware(_) | RampError::HardwareFault(_) => 5,
        };
    }
    if is_config_error(err) {
        return 4;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use psramp_core::error::RampError;
    use serde_json::json;

    let msg = humanize(err);
    if let Some(re) = err.downcast_ref::<RampError>() {
        let reason = abort_reason_name(re);
        let details = match re {
            RampError::SettleTimeout {
                target,
                tolerance,
                elapsed,
            } => Some(json!({
                "target": target,
                "tolerance": tolerance,
                "elapsed_ms": elapsed.as_millis() as u64,
                "settle": LAST_SETTLE.get().map(|s| json!({
                    "tol": s.tol,
                    "base_timeout_s": s.base_timeout_s,
                    "dwell_s": s.dwell_s,
                    "stable_time_s": s.stable_time_s,
                })),
            })),
            _ => None,
        };
        let obj = if let Some(d) = details {
            json!({ "reason": reason, "details": d, "message": msg })
        } else {
            json!({ "reason": reason, "message": msg })
        };
        return obj.to_string();
    }

    let reason = if is_config_error(err) {
        "Config"
    } else {
        "Error"
    };
    json!({ "reason": reason, "message": msg }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use psramp_core::error::RampError;
    use std::time::Duration;

    #[test]
    fn exit_codes_are_stable() {
        let cases = [
            (RampError::Interrupted, 2),
            (
                RampError::SettleTimeout {
                    target: 1.0,
                    tolerance: 0.02,
                    elapsed: Duration::from_secs(8),
                },
                3,
            ),
            (RampError::Config("step".into()), 4),
            (RampError::Hardware("gone".into()), 5),
            (RampError::HardwareFault("disabled".into()), 5),
        ];
        for (e, code) in cases {
            assert_eq!(exit_code_for_error(&eyre::Report::new(e)), code);
        }
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
        assert_eq!(
            exit_code_for_error(&eyre::eyre!("invalid configuration after overrides")),
            4
        );
    }

    #[test]
    fn wrapped_errors_keep_their_code() {
        let e = eyre::Report::new(RampError::Hardware("gone".into())).wrap_err("step 3");
        assert_eq!(exit_code_for_error(&e), 5);
        assert!(humanize(&e).contains("Device communication failed"));
    }

    #[test]
    fn timeout_json_has_details() {
        let e = eyre::Report::new(RampError::SettleTimeout {
            target: 5.0,
            tolerance: 0.02,
            elapsed: Duration::from_millis(12_100),
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "SettleTimeout");
        assert_eq!(v["details"]["elapsed_ms"], 12_100);
        assert!(v["message"].as_str().unwrap().contains("did not settle"));
    }
}
