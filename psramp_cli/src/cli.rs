//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Effective settle knobs used for the current run (for JSON error details).
pub static LAST_SETTLE: OnceLock<CliSettle> = OnceLock::new();

#[derive(Copy, Clone, Debug)]
pub struct CliSettle {
    pub tol: f64,
    pub base_timeout_s: f64,
    pub dwell_s: f64,
    pub stable_time_s: f64,
}

#[derive(Parser, Debug)]
#[command(name = "psramp", version, about = "Power-supply ramp-and-settle scanner")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/psramp.toml")]
    pub config: PathBuf,

    /// Print readings and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Per-run overrides of the `[scan]` and `[settle]` config sections.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ScanOverrides {
    /// First setpoint (device units)
    #[arg(long, allow_negative_numbers = true)]
    pub start: Option<f64>,
    /// Last setpoint bound (device units)
    #[arg(long, allow_negative_numbers = true)]
    pub stop: Option<f64>,
    /// Setpoint spacing; the sign is ignored
    #[arg(long, allow_negative_numbers = true)]
    pub step: Option<f64>,
    /// Tolerance band half-width
    #[arg(long)]
    pub tol: Option<f64>,
    /// Readback polling interval in seconds
    #[arg(long)]
    pub dwell: Option<f64>,
    /// Delay before each new setpoint, in seconds
    #[arg(long = "pre-wait", value_name = "SECS")]
    pub pre_wait: Option<f64>,
    /// Delay between convergence and measurement, in seconds
    #[arg(long, value_name = "SECS")]
    pub hold: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ramp through the configured setpoints and measure at each one.
    ///
    /// Each step's deadline is its dynamic timeout (base_timeout plus travel
    /// time plus a margin); settle.max_time is not used here.
    Scan {
        #[command(flatten)]
        overrides: ScanOverrides,
    },
    /// Power on, command one setpoint and wait until it settles, bounded by settle.max_time
    Settle {
        /// Setpoint to ramp to (device units)
        #[arg(allow_negative_numbers = true)]
        target: f64,
    },
    /// Print a status snapshot of the device
    Status,
    /// Switch the device output off
    PowerOff,
    /// Quick health check: open the device and read back once
    SelfCheck,
}
