//! SimulatedWorkExecutor - stand-in task body.
//!
//! Pretends to work on a product for `steps * step` and always succeeds.
//! Real deployments plug their own `TaskExecutor` instead.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{ExecutionError, Outcome, TaskIdentity};
use crate::ports::TaskExecutor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedWork {
    pub steps: u32,
    pub step_ms: u64,
}

impl Default for SimulatedWork {
    fn default() -> Self {
        Self {
            steps: 10,
            step_ms: 1_000,
        }
    }
}

pub struct SimulatedWorkExecutor {
    steps: u32,
    step: Duration,
}

impl SimulatedWorkExecutor {
    pub fn new(work: &SimulatedWork) -> Self {
        Self {
            steps: work.steps,
            step: Duration::from_millis(work.step_ms),
        }
    }
}

#[async_trait]
impl TaskExecutor for SimulatedWorkExecutor {
    async fn execute(&self, identity: &TaskIdentity) -> Result<Outcome, ExecutionError> {
        info!(
            "executing {:?} for product {:?} on process {:?}",
            identity.nature, identity.product, identity.process
        );
        for step in 1..=self.steps {
            tokio::time::sleep(self.step).await;
            debug!(step, of = self.steps, "working on {}", identity);
        }
        info!("done with {}", identity);
        Ok(Outcome::success())
    }
}
