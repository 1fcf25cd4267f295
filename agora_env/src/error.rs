//! Error types for the Agora environment abstraction.

use thiserror::Error;

/// Errors that can occur while talking to an external collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    /// Transport failed (connection refused, closed, non-success status)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The addressed entity does not exist on the service of record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response payload could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Collaborator is reachable but refused to serve the request
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a not-found error.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Creates a malformed-payload error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<serde_json::Error> for EnvError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

impl From<reqwest::Error> for EnvError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(0)
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
