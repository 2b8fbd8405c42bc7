#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the ramp-and-settle controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section except `[scan]` may be omitted; the defaults match the
//!   controller's documented tunables.
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct ScanCfg {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    /// Extra device channels captured with every measurement (e.g. "voltage").
    #[serde(default)]
    pub extra_channels: Vec<String>,
}

/// Settle tunables, all in seconds except `tol` (device units).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SettleCfg {
    pub pre_wait_s: f64,
    pub hold_s: f64,
    pub tol: f64,
    pub base_timeout: f64,
    pub dwell: f64,
    pub stable_time: f64,
    pub max_time: f64,
}

impl Default for SettleCfg {
    fn default() -> Self {
        Self {
            pre_wait_s: 3.0,
            hold_s: 2.0,
            tol: 0.02,
            base_timeout: 5.0,
            dwell: 0.1,
            stable_time: 0.4,
            max_time: 10.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Sim,
    Scpi,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceCfg {
    pub kind: DeviceKind,
    /// Serial port path for SCPI devices.
    pub port: Option<String>,
    pub baud: u32,
    /// Per-query response timeout (ms).
    pub io_timeout_ms: u64,
    /// Ramp rate (units/s) programmed before power-on; left untouched when absent.
    pub slew_rate: Option<f64>,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            kind: DeviceKind::Sim,
            port: None,
            baud: 9600,
            io_timeout_ms: 500,
            slew_rate: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    /// Actual ramp rate of the simulated output (units/s).
    pub slew_rate: f64,
    /// Output value at power-up.
    pub initial: f64,
    /// Value reported by `read_slew_rate`; defaults to `slew_rate` when absent.
    pub reported_slew_rate: Option<f64>,
    /// Field produced by the simulated gaussmeter per unit of output current.
    pub gauss_per_amp: f64,
    /// Drive the scan from a virtual clock instead of wall time.
    pub virtual_time: bool,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            slew_rate: 1.0,
            initial: 0.0,
            reported_slew_rate: None,
            gauss_per_amp: 12.5,
            virtual_time: false,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub scan: ScanCfg,
    #[serde(default)]
    pub settle: SettleCfg,
    #[serde(default)]
    pub device: DeviceCfg,
    #[serde(default)]
    pub sim: SimCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_path(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn non_negative(name: &str, v: f64) -> eyre::Result<()> {
    if !v.is_finite() || v < 0.0 {
        eyre::bail!("{name} must be a finite value >= 0");
    }
    Ok(())
}

fn positive(name: &str, v: f64) -> eyre::Result<()> {
    if !v.is_finite() || v <= 0.0 {
        eyre::bail!("{name} must be a finite value > 0");
    }
    Ok(())
}

fn at_most_an_hour(name: &str, secs: f64) -> eyre::Result<()> {
    if secs > 60.0 * 60.0 {
        eyre::bail!("{name} is unreasonably large (>1h)");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Scan
        if !self.scan.start.is_finite() || !self.scan.stop.is_finite() {
            eyre::bail!("scan.start and scan.stop must be finite");
        }
        if !self.scan.step.is_finite() || self.scan.step == 0.0 {
            eyre::bail!("scan.step must be finite and non-zero");
        }
        if self.scan.extra_channels.iter().any(|c| c.trim().is_empty()) {
            eyre::bail!("scan.extra_channels must not contain empty names");
        }

        // Settle
        let s = &self.settle;
        non_negative("settle.pre_wait_s", s.pre_wait_s)?;
        non_negative("settle.hold_s", s.hold_s)?;
        // Zero is allowed (exact match only); negative makes the band empty.
        non_negative("settle.tol", s.tol)?;
        non_negative("settle.base_timeout", s.base_timeout)?;
        positive("settle.dwell", s.dwell)?;
        non_negative("settle.stable_time", s.stable_time)?;
        positive("settle.max_time", s.max_time)?;
        at_most_an_hour("settle.pre_wait_s", s.pre_wait_s)?;
        at_most_an_hour("settle.hold_s", s.hold_s)?;
        at_most_an_hour("settle.base_timeout", s.base_timeout)?;
        at_most_an_hour("settle.dwell", s.dwell)?;
        at_most_an_hour("settle.stable_time", s.stable_time)?;
        at_most_an_hour("settle.max_time", s.max_time)?;

        // Device
        if self.device.kind == DeviceKind::Scpi {
            match self.device.port.as_deref() {
                Some(p) if !p.trim().is_empty() => {}
                _ => eyre::bail!("device.port is required when device.kind = \"scpi\""),
            }
        }
        if self.device.baud == 0 {
            eyre::bail!("device.baud must be > 0");
        }
        if self.device.io_timeout_ms == 0 {
            eyre::bail!("device.io_timeout_ms must be >= 1");
        }
        if let Some(r) = self.device.slew_rate {
            positive("device.slew_rate", r)?;
        }

        // Simulation
        positive("sim.slew_rate", self.sim.slew_rate)?;
        if !self.sim.initial.is_finite() {
            eyre::bail!("sim.initial must be finite");
        }
        if let Some(r) = self.sim.reported_slew_rate
            && r.is_nan()
        {
            eyre::bail!("sim.reported_slew_rate must be a number");
        }
        if !self.sim.gauss_per_amp.is_finite() {
            eyre::bail!("sim.gauss_per_amp must be finite");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
