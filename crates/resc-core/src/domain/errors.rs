//! Error types, one enum per concern.
//!
//! Store errors are infrastructure failures and are retried by the worker
//! loop. Reference and execution errors never leave the loop: they are
//! turned into log lines and outcomes.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("invalid task reference {reference:?}: {segments} segment(s), expected {expected} non-empty")]
    InvalidReference {
        reference: String,
        segments: usize,
        expected: usize,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store command error: {0}")]
    Command(String),
}

/// Failure reported by a task body.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ExecutionError(String);

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
