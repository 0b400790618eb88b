use serde::{Deserialize, Serialize};

/// What a worker loop has done since it started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    /// References moved back from the taken queue at startup.
    pub recovered: usize,
    pub reserved: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// References that failed to parse.
    pub invalid: usize,
    pub pending_mismatches: usize,
    pub idle_ticks: usize,
    pub store_errors: usize,
}

impl WorkerCounts {
    /// Tasks that went all the way through acknowledgment.
    pub fn acknowledged(&self) -> usize {
        self.succeeded + self.failed
    }
}
