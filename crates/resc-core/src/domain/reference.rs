//! Task references and their parsed identity.
//!
//! A reference is the opaque string that travels through the queues
//! (`<nature>/<process>/<product>`). The worker only ever moves references
//! around; the identity is derived on demand, right before execution.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ReferenceError;

/// Number of `/`-separated segments in a well-formed reference.
const SEGMENTS: usize = 3;

/// A task reference as stored in the queues.
///
/// Equality is byte equality of the underlying string. No validation happens
/// here: malformed references must still be reservable and acknowledgeable,
/// only parsing rejects them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRef(String);

impl TaskRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Decode the structured identity of this reference.
    pub fn parse(&self) -> Result<TaskIdentity, ReferenceError> {
        TaskIdentity::parse(self.as_str())
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TaskRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Parsed form of a [`TaskRef`].
///
/// Lossless: [`TaskIdentity::to_ref`] rejoins the segments with `/` and gives
/// back the original reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskIdentity {
    pub nature: String,
    pub process: String,
    pub product: String,
}

impl TaskIdentity {
    /// Split `reference` on `/`.
    ///
    /// Succeeds only with exactly three non-empty segments. Pure: no queue
    /// is touched.
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        let segments: Vec<&str> = reference.split('/').collect();
        match segments.as_slice() {
            [nature, process, product]
                if !nature.is_empty() && !process.is_empty() && !product.is_empty() =>
            {
                Ok(Self {
                    nature: nature.to_string(),
                    process: process.to_string(),
                    product: product.to_string(),
                })
            }
            _ => Err(ReferenceError::InvalidReference {
                reference: reference.to_string(),
                segments: segments.len(),
                expected: SEGMENTS,
            }),
        }
    }

    pub fn to_ref(&self) -> TaskRef {
        TaskRef(self.to_string())
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.nature, self.process, self.product)
    }
}
