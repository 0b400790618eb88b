//! WorkerLoop - the worker state machine.
//!
//! # Flow
//! 1. Recovering: drain the taken queue back into input (once, at startup)
//! 2. Listening: reserve with timeout (timeout = idle tick)
//! 3. Reserved: release the pending set entry
//! 4. Executing: parse the reference, run the executor
//! 5. Acknowledging: push to output, clear the reservation
//!    (or Quarantining: push to the invalid queue, clear the reservation)
//!
//! A failed store call leaves the state untouched; `run` backs off and
//! replays the same step.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::reservation::ReservationManager;
use super::retry::RetryPolicy;
use crate::domain::{Outcome, StoreError, TaskIdentity, WorkerState};
use crate::observability::WorkerCounts;
use crate::ports::TaskExecutor;

pub struct WorkerLoop {
    worker_id: usize,
    reservations: ReservationManager,
    executor: Arc<dyn TaskExecutor>,
    reserve_timeout: Duration,
    retry_policy: RetryPolicy,
    state: WorkerState,
    counts: WorkerCounts,
    consecutive_failures: u32,
}

impl WorkerLoop {
    pub fn new(
        worker_id: usize,
        reservations: ReservationManager,
        executor: Arc<dyn TaskExecutor>,
        reserve_timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            worker_id,
            reservations,
            executor,
            reserve_timeout,
            retry_policy,
            state: WorkerState::Recovering,
            counts: WorkerCounts::default(),
            consecutive_failures: 0,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn counts(&self) -> &WorkerCounts {
        &self.counts
    }

    /// Perform exactly one state transition.
    ///
    /// On `Err` the state is unchanged and the step can be replayed.
    pub async fn step(&mut self) -> Result<(), StoreError> {
        let next = match self.state.clone() {
            WorkerState::Recovering => {
                self.reservations
                    .recover_counting(&mut self.counts.recovered)
                    .await?;
                info!(
                    "[worker-{}] listening on queue {:?}",
                    self.worker_id,
                    self.reservations.names().input
                );
                WorkerState::Listening
            }

            WorkerState::Listening => match self.reservations.reserve(self.reserve_timeout).await? {
                Some(reference) => {
                    self.counts.reserved += 1;
                    WorkerState::Reserved(reference)
                }
                None => {
                    debug!("[worker-{}] nothing to do", self.worker_id);
                    self.counts.idle_ticks += 1;
                    WorkerState::Listening
                }
            },

            WorkerState::Reserved(reference) => {
                if let Some(removed) = self.reservations.release_pending(&reference).await?
                    && removed != 1
                {
                    self.counts.pending_mismatches += 1;
                }
                WorkerState::Executing(reference)
            }

            WorkerState::Executing(reference) => match reference.parse() {
                Ok(identity) => {
                    let outcome = execute(Arc::clone(&self.executor), identity).await;
                    if let Some(reason) = &outcome.reason
                        && !outcome.is_success()
                    {
                        error!("[worker-{}] task {:?} failed: {}", self.worker_id, reference, reason);
                    }
                    WorkerState::Acknowledging {
                        reference,
                        outcome,
                        published: false,
                    }
                }
                Err(e) if self.reservations.names().invalid.is_some() => {
                    warn!("[worker-{}] {}", self.worker_id, e);
                    WorkerState::Quarantining {
                        reference,
                        pushed: false,
                    }
                }
                Err(e) => {
                    // Left in the taken queue on purpose; only a restart
                    // (recovery) will see it again.
                    error!("[worker-{}] {}, reservation left in place", self.worker_id, e);
                    self.counts.invalid += 1;
                    WorkerState::Listening
                }
            },

            WorkerState::Quarantining { reference, pushed } => {
                if !pushed {
                    self.reservations.push_invalid(&reference).await?;
                    self.state = WorkerState::Quarantining {
                        reference: reference.clone(),
                        pushed: true,
                    };
                }
                self.reservations.clear_reservation(&reference).await?;
                self.counts.invalid += 1;
                WorkerState::Listening
            }

            WorkerState::Acknowledging {
                reference,
                outcome,
                published,
            } => {
                if !published {
                    self.reservations.publish_completion(&reference).await?;
                    self.state = WorkerState::Acknowledging {
                        reference: reference.clone(),
                        outcome: outcome.clone(),
                        published: true,
                    };
                }
                self.reservations.clear_reservation(&reference).await?;
                self.reservations.announce_done(&reference).await;
                if outcome.is_success() {
                    self.counts.succeeded += 1;
                } else {
                    self.counts.failed += 1;
                }
                debug!("[worker-{}] done with task {:?}", self.worker_id, reference);
                WorkerState::Listening
            }
        };
        self.state = next;
        Ok(())
    }

    /// Run until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// The signal is honoured only when no reference is in flight: once the
    /// worker holds a reservation, the task is executed and acknowledged
    /// before the loop exits. A signal arriving while Listening drops the
    /// pending reserve; if the store had already moved a reference to the
    /// taken queue, it stays there until the next start recovers it.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let in_flight = self.state.reference().is_some();
            if *shutdown.borrow() && !in_flight {
                break;
            }

            let result = if self.state == WorkerState::Listening {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                    result = self.step() => result,
                }
            } else {
                self.step().await
            };

            match result {
                Ok(()) => self.consecutive_failures = 0,
                Err(e) => {
                    self.consecutive_failures += 1;
                    self.counts.store_errors += 1;
                    let delay = self.retry_policy.next_delay(self.consecutive_failures);
                    error!(
                        "[worker-{}] store error while {}: {} (retry #{} in {:?})",
                        self.worker_id,
                        self.state.name(),
                        e,
                        self.consecutive_failures,
                        delay
                    );
                    if in_flight {
                        tokio::time::sleep(delay).await;
                    } else {
                        tokio::select! {
                            changed = shutdown.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
        info!(
            "[worker-{}] stopped while {} ({:?})",
            self.worker_id,
            self.state.name(),
            self.counts
        );
    }
}

/// Run the executor on its own task so a panic turns into a failure
/// outcome instead of taking the worker down.
async fn execute(executor: Arc<dyn TaskExecutor>, identity: TaskIdentity) -> Outcome {
    let handle = tokio::spawn(async move { executor.execute(&identity).await });
    match handle.await {
        Ok(result) => result.into(),
        Err(e) => Outcome::failure(e.to_string()),
    }
}
