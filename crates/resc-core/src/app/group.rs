//! WorkerGroup - spawned worker loops sharing one shutdown signal.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;

use super::worker_loop::WorkerLoop;
use crate::observability::WorkerCounts;

/// Handle on running workers.
/// - dropping the group (and so `shutdown_tx`) stops every worker
/// - `shutdown_and_join()` stops them and returns their final counts
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<WorkerLoop>>,
}

impl WorkerGroup {
    /// Spawn each loop on the tokio runtime.
    pub fn spawn(workers: Vec<WorkerLoop>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = workers
            .into_iter()
            .map(|mut worker| {
                let rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    worker.run(rx).await;
                    worker
                })
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Ask every worker to stop. A worker holding a reservation finishes and
    /// acknowledges it, then exits. A worker blocked in reserve exits at
    /// once; a reference the store moved during that call is left in the
    /// taken queue for the next start to recover.
    pub fn request_shutdown(&self) {
        // ignore send error: every worker may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) -> Vec<WorkerCounts> {
        self.request_shutdown();
        let mut counts = Vec::with_capacity(self.joins.len());
        for j in self.joins {
            match j.await {
                Ok(worker) => counts.push(worker.counts().clone()),
                Err(e) => error!("worker task ended abnormally: {e}"),
            }
        }
        counts
    }
}
