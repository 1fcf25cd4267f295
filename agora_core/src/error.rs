//! Error types for the Agora engine.

use agora_env::EnvError;
use thiserror::Error;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An external collaborator failed
    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    /// The time source failed during clock advancement
    #[error("Clock advancement failed: {0}")]
    Clock(EnvError),

    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Prompt template referenced an unknown or missing field
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Persona has no externally assigned id yet
    #[error("Persona {0} is not registered")]
    Unregistered(String),

    /// Opinion label not present in the configured groups
    #[error("Unknown opinion label: {0}")]
    UnknownLabel(String),

    /// Social graph is unusable for bootstrap
    #[error("Graph error: {0}")]
    Graph(String),
}

impl CoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn prompt(msg: impl Into<String>) -> Self {
        Self::Prompt(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }
}

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;
