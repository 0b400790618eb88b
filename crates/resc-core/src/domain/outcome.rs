//! Outcome model: the result of executing one task.
//!
//! The worker acknowledges both kinds the same way. The distinction exists
//! for logs and counters only; it is not published to the output queue.

use serde::{Deserialize, Serialize};

use super::errors::ExecutionError;

/// Serialized as SUCCESS / FAILURE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failure,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

impl From<Result<Outcome, ExecutionError>> for Outcome {
    fn from(result: Result<Outcome, ExecutionError>) -> Self {
        match result {
            Ok(outcome) => outcome,
            Err(e) => Outcome::failure(e.message()),
        }
    }
}
