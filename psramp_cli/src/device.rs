//! Hardware assembly: turn the `[device]` / `[sim]` config into a source,
//! its detectors and the clock the scan runs on.

use std::sync::Arc;

use eyre::Result;
use psramp_config::{Config, DeviceKind};
use psramp_hardware::{SimulatedGaussmeter, SimulatedSupply};
use psramp_traits::{Clock, CurrentSource, Detector, ManualClock, MonotonicClock};

pub struct Device {
    pub source: Box<dyn CurrentSource>,
    pub detectors: Vec<Box<dyn Detector>>,
    pub clock: Arc<dyn Clock + Send + Sync>,
}

pub fn open(cfg: &Config) -> Result<Device> {
    match cfg.device.kind {
        DeviceKind::Sim => Ok(open_sim(cfg)),
        DeviceKind::Scpi => open_scpi(cfg),
    }
}

fn open_sim(cfg: &Config) -> Device {
    let clock: Arc<dyn Clock + Send + Sync> = if cfg.sim.virtual_time {
        Arc::new(ManualClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    };
    let supply = SimulatedSupply::new(clock.clone())
        .with_slew_rate(cfg.sim.slew_rate)
        .with_initial(cfg.sim.initial)
        .with_reported_slew_rate(cfg.sim.reported_slew_rate);
    let gauss = SimulatedGaussmeter::new(supply.probe(), cfg.sim.gauss_per_amp);
    tracing::info!(
        slew_rate = cfg.sim.slew_rate,
        virtual_time = cfg.sim.virtual_time,
        "using simulated supply"
    );
    Device {
        source: Box::new(supply),
        detectors: vec![Box::new(gauss)],
        clock,
    }
}

#[cfg(feature = "hardware")]
fn open_scpi(cfg: &Config) -> Result<Device> {
    use eyre::WrapErr;
    use std::time::Duration;

    let port = cfg
        .device
        .port
        .as_deref()
        .ok_or_else(|| eyre::eyre!("device.port is required when device.kind = \"scpi\""))?;
    let supply = psramp_hardware::ScpiSupply::open(
        port,
        cfg.device.baud,
        Duration::from_millis(cfg.device.io_timeout_ms),
    )
    .wrap_err_with(|| format!("open serial port {port}"))?;
    tracing::info!(port, baud = cfg.device.baud, "using SCPI supply");
    Ok(Device {
        source: Box::new(supply),
        detectors: Vec::new(),
        clock: Arc::new(MonotonicClock::new()),
    })
}

#[cfg(not(feature = "hardware"))]
fn open_scpi(_cfg: &Config) -> Result<Device> {
    eyre::bail!(
        "invalid configuration: device.kind = \"scpi\" needs a build with `--features hardware`"
    )
}
