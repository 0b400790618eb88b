//! WorkerBuilder - wires a config, a store and an executor into a WorkerLoop.
//!
//! Validation happens here, at startup, so a misconfigured worker never
//! touches the queues.

use std::sync::Arc;

use super::reservation::ReservationManager;
use super::worker_loop::WorkerLoop;
use crate::config::WorkerConfig;
use crate::domain::ConfigError;
use crate::ports::{QueueStore, TaskExecutor};

/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(config)
///     .store(Arc::new(store))
///     .executor(Arc::new(MyExecutor))
///     .build()?;
/// ```
pub struct WorkerBuilder {
    config: WorkerConfig,
    worker_id: usize,
    store: Option<Arc<dyn QueueStore>>,
    executor: Option<Arc<dyn TaskExecutor>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no queue store given")]
    MissingStore,

    #[error("no task executor given")]
    MissingExecutor,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WorkerBuilder {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            worker_id: 0,
            store: None,
            executor: None,
        }
    }

    /// Identifier used in log lines; defaults to 0.
    pub fn worker_id(mut self, worker_id: usize) -> Self {
        self.worker_id = worker_id;
        self
    }

    pub fn store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> Result<WorkerLoop, BuildError> {
        let names = self.config.queue_names()?;
        let reserve_timeout = self.config.reserve_timeout()?;
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let executor = self.executor.ok_or(BuildError::MissingExecutor)?;
        Ok(WorkerLoop::new(
            self.worker_id,
            ReservationManager::new(store, names),
            executor,
            reserve_timeout,
            self.config.store_retry,
        ))
    }
}
