//! TaskExecutor port - the unit of work behind a task identity.

use async_trait::async_trait;

use crate::domain::{ExecutionError, Outcome, TaskIdentity};

/// Runs the business logic for one task.
///
/// # Contract
/// - Must eventually return; a stuck executor stalls its worker.
/// - Must not touch the queues. All queue effects belong to the worker loop.
/// - `Err` and panics are both reported as a failure outcome.
///
/// # Example
/// ```ignore
/// struct Flush;
///
/// #[async_trait]
/// impl TaskExecutor for Flush {
///     async fn execute(&self, identity: &TaskIdentity) -> Result<Outcome, ExecutionError> {
///         flush_valve(&identity.process, &identity.product).await?;
///         Ok(Outcome::success())
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, identity: &TaskIdentity) -> Result<Outcome, ExecutionError>;
}
