//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.
//! Errors are classified with [`ErrorKind`] so callers can tell a failed
//! provider call apart from a reply that could not be understood.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Malformed AI reply: {reason}")]
    MalformedReply {
        reason: String,
        raw_response: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Analysis of record {record_id} failed: {source}")]
    Analysis {
        record_id: Uuid,
        #[source]
        source: Box<Error>,
    },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The provider could not be reached, rejected the call, or answered
    /// with an unusable envelope.
    Transport,
    /// The provider answered but the content was not what was asked for.
    MalformedReply,
    InvalidInput,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::AiProvider(_) => ErrorKind::Transport,
            Error::MalformedReply { .. } => ErrorKind::MalformedReply,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Analysis { source, .. } => source.kind(),
            Error::Io(_)
            | Error::Serialization(_)
            | Error::NotFound(_)
            | Error::Config(_) => ErrorKind::Other,
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub(crate) fn malformed(reason: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Error::MalformedReply {
            reason: reason.into(),
            raw_response: raw_response.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
