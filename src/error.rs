//! nnha Error Types

use std::time::Duration;
use thiserror::Error;

/// Result type alias for nnha operations
pub type Result<T> = std::result::Result<T, Error>;

/// nnha error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // State errors
    #[error("State error: {0}")]
    State(String),

    #[error("State serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot set {flag}: prerequisite(s) {missing:?} not set")]
    PrerequisiteMissing {
        flag: &'static str,
        missing: Vec<&'static str>,
    },

    // Coordination errors
    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("NameNode operation '{operation}' failed: {reason}")]
    Service { operation: String, reason: String },

    #[error("Relation error: {0}")]
    Relation(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Check if this error is retryable on the next dispatch cycle
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::Service { .. }
                | Error::Relation(_)
                | Error::Network(_)
        )
    }

    /// Shorthand for a failed collaborator call
    pub fn service(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Service {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}
