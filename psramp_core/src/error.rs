use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RampError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("readback did not settle within ±{tolerance} of {target} after {elapsed:?}")]
    SettleTimeout {
        target: f64,
        tolerance: f64,
        elapsed: Duration,
    },
    #[error("scan interrupted by operator")]
    Interrupted,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing current source")]
    MissingSource,
    #[error("missing scan range")]
    MissingRange,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
