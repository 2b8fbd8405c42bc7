//! Scan execution and the device utility commands, with their console output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::WrapErr;
use psramp_config::Config;
use psramp_core::error::Result as CoreResult;
use psramp_core::hw_error::map_hw_error;
use psramp_core::{DynRampScan, RampError, ScanRange, ScanReport, StepReading, settle_at};
use serde_json::json;

use crate::cli::{CliSettle, LAST_SETTLE, ScanOverrides};
use crate::device::Device;

pub fn abort_reason_name(e: &RampError) -> &'static str {
    match e {
        RampError::SettleTimeout { .. } => "SettleTimeout",
        RampError::Interrupted => "Interrupted",
        RampError::Hardware(_) => "Hardware",
        RampError::HardwareFault(_) => "HardwareFault",
        RampError::Config(_) => "Config",
    }
}

/// Apply command-line overrides and re-validate the merged config.
pub fn apply_overrides(cfg: &mut Config, o: &ScanOverrides) -> eyre::Result<()> {
    if let Some(v) = o.start {
        cfg.scan.start = v;
    }
    if let Some(v) = o.stop {
        cfg.scan.stop = v;
    }
    if let Some(v) = o.step {
        cfg.scan.step = v;
    }
    if let Some(v) = o.tol {
        cfg.settle.tol = v;
    }
    if let Some(v) = o.dwell {
        cfg.settle.dwell = v;
    }
    if let Some(v) = o.pre_wait {
        cfg.settle.pre_wait_s = v;
    }
    if let Some(v) = o.hold {
        cfg.settle.hold_s = v;
    }
    cfg.validate().wrap_err("invalid configuration after command-line overrides")
}

fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn print_reading(r: &StepReading, json: bool) {
    if json {
        let line = json!({
            "type": "reading",
            "timestamp": unix_ms(),
            "index": r.index,
            "setpoint": r.setpoint,
            "readback": r.readback,
            "settle_ms": r.settle_time.as_millis() as u64,
            "timeout_ms": r.timeout.as_millis() as u64,
            "slew_rate": r.slew_rate,
            "slew_fallback": r.slew_fallback,
            "fields": r.fields,
        });
        println!("{line}");
        return;
    }
    let fallback = if r.slew_fallback {
        " (fallback slew)"
    } else {
        ""
    };
    println!(
        "step {}: setpoint {:.4} readback {:.4} settled in {} ms{fallback}",
        r.index,
        r.setpoint,
        r.readback,
        r.settle_time.as_millis()
    );
    for (k, v) in &r.fields {
        println!("    {k} = {v:.6}");
    }
}

pub fn run_scan(
    cfg: &Config,
    device: Device,
    shutdown: Arc<AtomicBool>,
    json: bool,
) -> CoreResult<ScanReport> {
    let settle: psramp_core::SettleCfg = (&cfg.settle).into();
    let range: ScanRange = (&cfg.scan).into();
    remember_settle(cfg);

    let mut builder = DynRampScan::builder()
        .with_source(device.source)
        .with_range(range)
        .with_settle(settle)
        .with_extra_channels(cfg.scan.extra_channels.iter().cloned())
        .with_clock(device.clock)
        .with_abort_check(move || shutdown.load(Ordering::Relaxed));
    if let Some(rate) = cfg.device.slew_rate {
        builder = builder.with_slew_rate(rate);
    }
    for det in device.detectors {
        builder = builder.with_detector(det);
    }
    let mut scan = builder.build()?;
    let total = scan.sequence().len();

    let mut measured = 0usize;
    let result = psramp_core::run_with(&mut scan, |r| {
        measured += 1;
        print_reading(r, json);
    });
    let elapsed = scan.elapsed();

    let abort_reason = result
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<RampError>())
        .map(abort_reason_name);
    if json {
        let line = json!({
            "type": "summary",
            "timestamp": unix_ms(),
            "setpoints": total,
            "measured": measured,
            "duration_ms": elapsed.as_millis() as u64,
            "abort_reason": abort_reason,
        });
        println!("{line}");
    } else if result.is_ok() {
        println!(
            "scan complete: {measured}/{total} setpoints in {:.1} s",
            elapsed.as_secs_f64()
        );
    } else {
        println!("scan stopped after {measured}/{total} setpoints");
    }
    result
}

fn remember_settle(cfg: &Config) {
    let _ = LAST_SETTLE.set(CliSettle {
        tol: cfg.settle.tol,
        base_timeout_s: cfg.settle.base_timeout,
        dwell_s: cfg.settle.dwell,
        stable_time_s: cfg.settle.stable_time,
    });
}

/// One-shot settle: the only place `settle.max_time` bounds the wait.
pub fn settle(cfg: &Config, mut device: Device, target: f64, json: bool) -> eyre::Result<()> {
    let settle: psramp_core::SettleCfg = (&cfg.settle).into();
    remember_settle(cfg);

    if let Some(rate) = cfg.device.slew_rate {
        device
            .source
            .set_slew_rate(rate)
            .map_err(hw)
            .wrap_err_with(|| format!("programming slew rate {rate}"))?;
    }
    device
        .source
        .power_on()
        .map_err(hw)
        .wrap_err("powering on device")?;
    device
        .source
        .command(target)
        .map_err(hw)
        .wrap_err_with(|| format!("commanding setpoint {target}"))?;
    let settled = settle_at(&mut device.source, &*device.clock, target, &settle)
        .map_err(eyre::Report::new)?;

    if json {
        let line = json!({
            "type": "settle",
            "timestamp": unix_ms(),
            "target": target,
            "readback": settled.readback,
            "settle_ms": settled.elapsed.as_millis() as u64,
            "samples": settled.samples,
        });
        println!("{line}");
    } else {
        println!(
            "settled at {target:.4}: readback {:.4} after {} ms",
            settled.readback,
            settled.elapsed.as_millis()
        );
    }
    Ok(())
}

fn hw(e: psramp_traits::BoxError) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}

pub fn status(mut device: Device, json: bool) -> eyre::Result<()> {
    let snap = device
        .source
        .snapshot()
        .map_err(hw)
        .wrap_err("reading device status")?;
    if json {
        println!("{}", json!({ "type": "status", "timestamp": unix_ms(), "fields": snap }));
    } else {
        for (k, v) in &snap {
            println!("{k}: {v}");
        }
    }
    Ok(())
}

pub fn power_off(mut device: Device, json: bool) -> eyre::Result<()> {
    device
        .source
        .power_off()
        .map_err(hw)
        .wrap_err("switching output off")?;
    if json {
        println!("{}", json!({ "type": "power_off", "ok": true }));
    } else {
        println!("output off");
    }
    Ok(())
}

pub fn self_check(mut device: Device, json: bool) -> eyre::Result<()> {
    let readback = device
        .source
        .read_back()
        .map_err(hw)
        .wrap_err("self-check readback")?;
    if json {
        println!("{}", json!({ "type": "self_check", "ok": true, "readback": readback }));
    } else {
        println!("OK (readback {readback:.4})");
    }
    Ok(())
}
