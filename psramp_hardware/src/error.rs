use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial error: {0}")]
    Serial(String),
    #[error("device response timeout")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("output is disabled; power on first")]
    OutputDisabled,
    #[error("injected fault: {0}")]
    Injected(&'static str),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
