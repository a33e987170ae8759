use thiserror::Error;
use tts_core::SynthesisError;

use crate::validation::MAX_TEXT_CHARS;

/// Malformed or unclassifiable inbound message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message must be a JSON object")]
    NotAnObject,

    #[error("invalid UTF-8 in frame: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field {0} must be a string")]
    InvalidField(&'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("text must not be empty")]
    EmptyText,

    #[error("text exceeds limit ({} characters)", MAX_TEXT_CHARS)]
    TextTooLong,
}

/// The connection can no longer be written to.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Everything a single request can fail with.
///
/// The router is the one place these become wire `error` messages; a
/// `Transport` failure ends the session instead.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RequestError {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Protocol(_) => "protocol",
            RequestError::Validation(_) => "validation",
            RequestError::Synthesis(_) => "synthesis",
            RequestError::Transport(_) => "transport",
        }
    }
}

/// Process-level failures surfaced to the operator.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {addr}: {source}. Try a different PORT.")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize speech engine: {0}")]
    Engine(#[from] SynthesisError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
