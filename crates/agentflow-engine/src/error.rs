//! Error types for the agentflow engine

use thiserror::Error;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while interpreting a graph
#[derive(Debug, Error)]
pub enum EngineError {
    /// Node execution failed
    #[error("Node execution failed: {0}")]
    ExecutionFailed(String),

    /// Script evaluation produced an error instead of a value
    #[error("Expression error: {0}")]
    Expression(String),

    /// Node or provider configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A variable path could not be used
    #[error("Invalid variable path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A collaborator required by a node was not supplied
    #[error("No {0} client configured")]
    MissingCollaborator(&'static str),

    /// Completion collaborator failed
    #[error("Completion error: {0}")]
    Completion(String),

    /// Retrieval collaborator failed
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Usage sink failed
    #[error("Usage recording error: {0}")]
    Usage(String),

    /// Run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create an invalid configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid path error
    pub fn path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error represents cancellation rather than failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
