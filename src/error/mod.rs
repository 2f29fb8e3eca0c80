use thiserror::Error;

/// Result type for breaker construction and configuration
pub type Result<T> = std::result::Result<T, BreakerError>;

/// Errors raised by the breaker itself.
///
/// Errors produced by guarded operations are never wrapped in this type; they
/// are handed back to the caller as their own `E`.
#[derive(Error, Debug)]
pub enum BreakerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BreakerError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        BreakerError::Config(message.into())
    }
}
