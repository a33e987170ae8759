use std::time::Duration;

use thiserror::Error;

/// Failure of a single synthesis job.
///
/// A job that fails never yields partial audio: callers either get the full
/// artifact or one of these.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis engine failed: {0}")]
    Engine(String),

    #[error("synthesis produced no output artifact")]
    MissingOutput,

    #[error("synthesis produced empty audio")]
    EmptyOutput,

    #[error("scratch storage error: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("synthesis engine is not running")]
    Unavailable,

    #[error("synthesis engine panicked")]
    Panicked,

    #[error("synthesis timed out after {0:?}")]
    Timeout(Duration),
}

impl From<anyhow::Error> for SynthesisError {
    fn from(e: anyhow::Error) -> Self {
        SynthesisError::Engine(format!("{e:#}"))
    }
}
