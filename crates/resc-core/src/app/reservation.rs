//! ReservationManager - moves references between the queues.
//!
//! Lifecycle of a reference:
//!
//! ```text
//!   input --reserve--> taken --acknowledge--> output
//!     ^                  |
//!     +----recover-------+   (startup, after a crash)
//! ```
//!
//! Each arrow is a single atomic store operation, except acknowledge, which
//! is two (push to output, then remove from taken) in that order.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::QueueNames;
use crate::domain::{StoreError, TaskRef};
use crate::ports::QueueStore;

pub struct ReservationManager {
    store: Arc<dyn QueueStore>,
    names: QueueNames,
}

impl ReservationManager {
    pub fn new(store: Arc<dyn QueueStore>, names: QueueNames) -> Self {
        Self { store, names }
    }

    pub fn names(&self) -> &QueueNames {
        &self.names
    }

    /// Move the oldest reservation (tail of taken) back to the head of input.
    pub async fn recover_one(&self) -> Result<Option<TaskRef>, StoreError> {
        let moved = self
            .store
            .move_nonblocking(&self.names.taken, &self.names.input)
            .await?;
        if let Some(r) = &moved {
            debug!(
                " moving {:?} from {:?} to {:?}",
                r, self.names.taken, self.names.input
            );
        }
        Ok(moved.map(TaskRef::from))
    }

    /// Drain the taken queue into the input queue.
    ///
    /// Returns how many references were recovered. Relative order is kept:
    /// the taken queue read head-to-tail equals the recovered block at the
    /// head of the input queue. Safe to call again after a failure, already
    /// moved references are simply not seen twice.
    pub async fn recover(&self) -> Result<usize, StoreError> {
        let mut n = 0;
        self.recover_counting(&mut n).await?;
        Ok(n)
    }

    /// Same as [`recover`](Self::recover), but bumps `recovered` after each
    /// move, so the count stays exact when a later move fails.
    pub async fn recover_counting(&self, recovered: &mut usize) -> Result<(), StoreError> {
        debug!("worker cleans its taken queue {:?}", self.names.taken);
        let before = *recovered;
        while self.recover_one().await?.is_some() {
            *recovered += 1;
        }
        let n = *recovered - before;
        if n > 0 {
            warn!(
                "moved {} tasks from {:?} to {:?}",
                n, self.names.taken, self.names.input
            );
        }
        Ok(())
    }

    /// Atomically move one reference from input to taken, waiting up to
    /// `timeout`. `None` means the wait timed out.
    pub async fn reserve(&self, timeout: Duration) -> Result<Option<TaskRef>, StoreError> {
        let taken = self
            .store
            .move_blocking(&self.names.input, &self.names.taken, timeout)
            .await?;
        if let Some(r) = &taken {
            info!("<- got {:?} in queue {:?}", r, self.names.input);
        }
        Ok(taken.map(TaskRef::from))
    }

    /// Drop `reference` from the pending set, if one is configured.
    ///
    /// Returns the removal count, `None` when bookkeeping is disabled. Any
    /// count other than 1 means the producer and the worker disagree; it is
    /// logged, never fatal.
    pub async fn release_pending(&self, reference: &TaskRef) -> Result<Option<usize>, StoreError> {
        let Some(set) = &self.names.pending_set else {
            return Ok(None);
        };
        let removed = self.store.set_remove(set, reference.as_str()).await?;
        if removed != 1 {
            warn!(
                "pending set {:?}: removed {} entries for {:?}, expected 1",
                set, removed, reference
            );
        }
        Ok(Some(removed))
    }

    /// First half of an acknowledgment: make completion visible.
    pub async fn publish_completion(&self, reference: &TaskRef) -> Result<(), StoreError> {
        self.store
            .push_head(&self.names.output, reference.as_str())
            .await?;
        debug!("  -> {:?} pushed to queue {:?}", reference, self.names.output);
        Ok(())
    }

    /// Second half of an acknowledgment: drop one matching reservation.
    ///
    /// Returns the number of entries removed from the taken queue.
    pub async fn clear_reservation(&self, reference: &TaskRef) -> Result<usize, StoreError> {
        let removed = self
            .store
            .remove_matching(&self.names.taken, reference.as_str(), 1)
            .await?;
        if removed != 1 {
            warn!(
                "taken queue {:?}: removed {} entries for {:?}, expected 1",
                self.names.taken, removed, reference
            );
        }
        Ok(removed)
    }

    /// Push `reference` onto the output queue, then remove it from the taken
    /// queue. Never the other way round: completion must be visible before
    /// the reservation disappears, so nothing ever sees it as orphaned.
    pub async fn acknowledge(&self, reference: &TaskRef) -> Result<(), StoreError> {
        self.publish_completion(reference).await?;
        self.clear_reservation(reference).await?;
        Ok(())
    }

    /// Tell listeners the reference is done. Best effort.
    pub async fn announce_done(&self, reference: &TaskRef) {
        let Some(channel) = &self.names.events_channel else {
            return;
        };
        let message = format!("{} DONE {}", self.names.taken, reference);
        if let Err(e) = self.store.publish(channel, &message).await {
            error!("failed to publish on {:?}: {}", channel, e);
        }
    }

    /// First half of a quarantine: push `reference` to the invalid queue.
    ///
    /// Returns `false`, touching nothing, when no invalid queue is configured.
    pub async fn push_invalid(&self, reference: &TaskRef) -> Result<bool, StoreError> {
        let Some(invalid) = &self.names.invalid else {
            return Ok(false);
        };
        self.store.push_head(invalid, reference.as_str()).await?;
        info!("  -> {:?} moved to invalid queue {:?}", reference, invalid);
        Ok(true)
    }

    /// Route a reference that can't be parsed to the invalid queue, then drop
    /// its reservation.
    ///
    /// Returns `false`, leaving the reservation untouched, when no invalid
    /// queue is configured.
    pub async fn quarantine(&self, reference: &TaskRef) -> Result<bool, StoreError> {
        if !self.push_invalid(reference).await? {
            return Ok(false);
        }
        self.clear_reservation(reference).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::impls::InMemoryQueueStore;
    use std::collections::HashSet;

    const INPUT: &str = "trt/plantA/todo";
    const TAKEN: &str = "trt/plantA/todo/taken";
    const PENDING: &str = "trt/plantA/todo-set";
    const OUTPUT: &str = "global/done";

    fn manager(store: &InMemoryQueueStore, config: WorkerConfig) -> ReservationManager {
        let store: Arc<dyn QueueStore> = Arc::new(store.clone());
        ReservationManager::new(store, config.queue_names().unwrap())
    }

    fn with_pending_set() -> WorkerConfig {
        WorkerConfig {
            pending_set: Some(PENDING.to_string()),
            ..WorkerConfig::new(INPUT)
        }
    }

    #[tokio::test]
    async fn recover_moves_every_orphan_back_in_order() {
        let store = InMemoryQueueStore::new();
        for r in ["a/b/1", "a/b/2", "a/b/3"] {
            store.push_head(TAKEN, r).await.unwrap();
        }
        store.push_head(INPUT, "a/b/fresh").await.unwrap();
        let taken_before = store.list(TAKEN).await;

        let rm = manager(&store, WorkerConfig::new(INPUT));
        let n = rm.recover().await.unwrap();

        assert_eq!(n, 3);
        assert!(store.list(TAKEN).await.is_empty());
        let input = store.list(INPUT).await;
        assert_eq!(input.len(), 4);
        assert_eq!(&input[..3], taken_before.as_slice());
        assert_eq!(input[3], "a/b/fresh");
    }

    #[tokio::test]
    async fn recovered_oldest_is_reserved_first() {
        let store = InMemoryQueueStore::new();
        store.push_head(TAKEN, "a/b/oldest").await.unwrap();
        store.push_head(TAKEN, "a/b/newest").await.unwrap();

        let rm = manager(&store, WorkerConfig::new(INPUT));
        rm.recover().await.unwrap();

        let first = rm.reserve(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first, Some(TaskRef::new("a/b/oldest")));
    }

    #[tokio::test]
    async fn recover_on_empty_taken_queue_is_a_noop() {
        let store = InMemoryQueueStore::new();
        let rm = manager(&store, WorkerConfig::new(INPUT));
        assert_eq!(rm.recover().await.unwrap(), 0);
        assert!(store.list(INPUT).await.is_empty());
    }

    #[tokio::test]
    async fn interrupted_recovery_counts_what_it_moved() {
        let store = InMemoryQueueStore::new();
        for r in ["a/b/1", "a/b/2", "a/b/3"] {
            store.push_head(TAKEN, r).await.unwrap();
        }
        store
            .fail_after(crate::impls::StoreOp::MoveNonblocking, 2, 1)
            .await;
        let rm = manager(&store, WorkerConfig::new(INPUT));

        let mut recovered = 0;
        assert!(rm.recover_counting(&mut recovered).await.is_err());
        assert_eq!(recovered, 2);

        rm.recover_counting(&mut recovered).await.unwrap();
        assert_eq!(recovered, 3);
        assert!(store.list(TAKEN).await.is_empty());
    }

    #[tokio::test]
    async fn reserve_moves_to_taken() {
        let store = InMemoryQueueStore::new();
        store.push_head(INPUT, "trt/plantA/valve1").await.unwrap();
        let rm = manager(&store, WorkerConfig::new(INPUT));

        let r = rm.reserve(Duration::from_millis(10)).await.unwrap();

        assert_eq!(r, Some(TaskRef::new("trt/plantA/valve1")));
        assert!(store.list(INPUT).await.is_empty());
        assert_eq!(store.list(TAKEN).await, vec!["trt/plantA/valve1"]);
    }

    #[tokio::test]
    async fn reserve_times_out_with_none() {
        let store = InMemoryQueueStore::new();
        let rm = manager(&store, WorkerConfig::new(INPUT));
        assert_eq!(rm.reserve(Duration::from_millis(20)).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservers_never_share_a_reference() {
        let store = InMemoryQueueStore::new();
        let total = 200;
        for i in 0..total {
            store.push_head(INPUT, &format!("trt/plantA/valve{i}")).await.unwrap();
        }

        let mut workers = Vec::new();
        for _ in 0..8 {
            let rm = manager(&store, WorkerConfig::new(INPUT));
            workers.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(r) = rm.reserve(Duration::from_millis(50)).await.unwrap() {
                    got.push(r);
                }
                got
            }));
        }

        let mut all = Vec::new();
        for w in workers {
            all.extend(w.await.unwrap());
        }
        let unique: HashSet<_> = all.iter().cloned().collect();

        assert_eq!(all.len(), total);
        assert_eq!(unique.len(), total);
        assert_eq!(store.list(TAKEN).await.len(), total);
        assert!(store.list(INPUT).await.is_empty());
    }

    #[tokio::test]
    async fn release_pending_twice_counts_one_then_zero() {
        let store = InMemoryQueueStore::new();
        store.set_add(PENDING, "trt/plantA/valve1").await;
        let rm = manager(&store, with_pending_set());
        let r = TaskRef::new("trt/plantA/valve1");

        assert_eq!(rm.release_pending(&r).await.unwrap(), Some(1));
        assert_eq!(rm.release_pending(&r).await.unwrap(), Some(0));
        assert!(store.members(PENDING).await.is_empty());
    }

    #[tokio::test]
    async fn release_pending_without_set_is_disabled() {
        let store = InMemoryQueueStore::new();
        store.set_add(PENDING, "trt/plantA/valve1").await;
        let rm = manager(&store, WorkerConfig::new(INPUT));

        let released = rm
            .release_pending(&TaskRef::new("trt/plantA/valve1"))
            .await
            .unwrap();

        assert_eq!(released, None);
        assert_eq!(store.members(PENDING).await.len(), 1);
    }

    #[tokio::test]
    async fn acknowledge_publishes_once_and_clears_one_reservation() {
        let store = InMemoryQueueStore::new();
        store.push_head(INPUT, "trt/plantA/valve1").await.unwrap();
        store.push_head(TAKEN, "trt/plantA/other").await.unwrap();
        let rm = manager(&store, WorkerConfig::new(INPUT));
        let r = rm.reserve(Duration::from_millis(10)).await.unwrap().unwrap();

        rm.acknowledge(&r).await.unwrap();

        assert_eq!(store.list(OUTPUT).await, vec!["trt/plantA/valve1"]);
        assert_eq!(store.list(TAKEN).await, vec!["trt/plantA/other"]);
    }

    #[tokio::test]
    async fn failed_clear_leaves_completion_visible() {
        let store = InMemoryQueueStore::new();
        store.push_head(TAKEN, "trt/plantA/valve1").await.unwrap();
        store
            .fail_next(crate::impls::StoreOp::RemoveMatching, 1)
            .await;
        let rm = manager(&store, WorkerConfig::new(INPUT));
        let r = TaskRef::new("trt/plantA/valve1");

        assert!(rm.acknowledge(&r).await.is_err());

        // done is published, the reservation is still there
        assert_eq!(store.list(OUTPUT).await, vec!["trt/plantA/valve1"]);
        assert_eq!(store.list(TAKEN).await, vec!["trt/plantA/valve1"]);
    }

    #[tokio::test]
    async fn announce_done_publishes_on_events_channel() {
        let store = InMemoryQueueStore::new();
        let config = WorkerConfig {
            events_channel: Some("resc/events".to_string()),
            ..WorkerConfig::new(INPUT)
        };
        let rm = manager(&store, config);

        rm.announce_done(&TaskRef::new("trt/plantA/valve1")).await;

        assert_eq!(
            store.published().await,
            vec![(
                "resc/events".to_string(),
                format!("{TAKEN} DONE trt/plantA/valve1")
            )]
        );
    }

    #[tokio::test]
    async fn quarantine_requires_an_invalid_queue() {
        let store = InMemoryQueueStore::new();
        store.push_head(TAKEN, "bogus").await.unwrap();
        let r = TaskRef::new("bogus");

        let rm = manager(&store, WorkerConfig::new(INPUT));
        assert!(!rm.quarantine(&r).await.unwrap());
        assert_eq!(store.list(TAKEN).await, vec!["bogus"]);

        let config = WorkerConfig {
            invalid_queue: Some("trt/plantA/invalid".to_string()),
            ..WorkerConfig::new(INPUT)
        };
        let rm = manager(&store, config);
        assert!(rm.quarantine(&r).await.unwrap());
        assert!(store.list(TAKEN).await.is_empty());
        assert_eq!(store.list("trt/plantA/invalid").await, vec!["bogus"]);
        assert!(store.list(OUTPUT).await.is_empty());
    }
}
