#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `psramp`: ramp a power supply through a list of setpoints and measure at each.

mod cli;
mod device;
mod error_fmt;
mod scan;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use tracing_appender::non_blocking::WorkerGuard;

use crate::cli::{Cli, Commands, JSON_MODE};

fn main() {
    // color-eyre only for panics/backtraces; errors are rendered by `error_fmt`.
    let _ = color_eyre::install();

    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        let code = error_fmt::exit_code_for_error(&e);
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&e));
        } else {
            eprintln!("{}", error_fmt::humanize(&e));
        }
        tracing::debug!(error = ?e, code, "exiting with error");
        std::process::exit(code);
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let mut cfg = psramp_config::load_path(&cli.config)
        .wrap_err_with(|| format!("invalid configuration in {}", cli.config.display()))?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| cfg.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    // Dropping the guard flushes the file sink; keep it until the command returns.
    let _guard = init_tracing(cli.json, &level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Scan { overrides } => {
            scan::apply_overrides(&mut cfg, &overrides)?;
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || {
                flag.store(true, Ordering::Relaxed);
            })
            .wrap_err("install Ctrl-C handler")?;

            let device = device::open(&cfg)?;
            scan::run_scan(&cfg, device, shutdown, cli.json)?;
        }
        Commands::Settle { target } => {
            let device = device::open(&cfg)?;
            scan::settle(&cfg, device, target, cli.json)?;
        }
        Commands::Status => scan::status(device::open(&cfg)?, cli.json)?,
        Commands::PowerOff => scan::power_off(device::open(&cfg)?, cli.json)?,
        Commands::SelfCheck => scan::self_check(device::open(&cfg)?, cli.json)?,
    }
    Ok(())
}

/// Console logs go to stderr so stdout stays machine-readable. An optional
/// JSON file sink follows `[logging]`.
fn init_tracing(
    json: bool,
    level: &str,
    logging: &psramp_config::Logging,
) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid configuration: bad log level {level:?}"))?;

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let mut guard = None;
    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("invalid configuration: logging.file has no file name"))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, g) = tracing_appender::non_blocking(appender);
            guard = Some(g);
            Some(fmt::layer().json().with_writer(writer).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("initialize logging")?;
    Ok(guard)
}
