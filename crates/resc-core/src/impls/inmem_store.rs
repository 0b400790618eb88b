//! InMemoryQueueStore - a QueueStore living in process memory.
//!
//! Lists and sets sit behind one `tokio::sync::Mutex`, which makes every
//! primitive atomic with respect to the others. Blocking moves wait on a
//! `Notify` that fires whenever any list grows.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::StoreError;
use crate::ports::QueueStore;

/// Store operation names, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    MoveBlocking,
    MoveNonblocking,
    PushHead,
    RemoveMatching,
    SetRemove,
    Publish,
}

#[derive(Default)]
struct StoreState {
    /// front = head, back = tail
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, HashSet<String>>,
    published: Vec<(String, String)>,
    /// Injected failures per operation.
    failures: HashMap<StoreOp, Injected>,
}

/// `skip` calls succeed, then the next `times` calls fail.
#[derive(Debug, Clone, Copy, Default)]
struct Injected {
    skip: usize,
    times: usize,
}

impl StoreState {
    fn check(&mut self, op: StoreOp) -> Result<(), StoreError> {
        let Some(injected) = self.failures.get_mut(&op) else {
            return Ok(());
        };
        if injected.skip > 0 {
            injected.skip -= 1;
        } else if injected.times > 0 {
            injected.times -= 1;
            return Err(StoreError::Connection(format!("injected failure on {op:?}")));
        }
        Ok(())
    }

    fn pop_tail_push_head(&mut self, src: &str, dst: &str) -> Option<String> {
        let value = self.lists.get_mut(src)?.pop_back()?;
        self.lists
            .entry(dst.to_string())
            .or_default()
            .push_front(value.clone());
        Some(value)
    }
}

/// In-memory store for tests and local development.
///
/// Cloning shares the underlying state, so several simulated workers can
/// hold their own handle to the same queues.
///
/// # Example
/// ```ignore
/// let store = InMemoryQueueStore::new();
/// store.push_head("trt/plantA/todo", "trt/plantA/valve1").await?;
/// let moved = store.move_nonblocking("trt/plantA/todo", "trt/plantA/taken").await?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryQueueStore {
    state: Arc<Mutex<StoreState>>,
    notify: Arc<Notify>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a list, head first.
    pub async fn list(&self, queue: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .lists
            .get(queue)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn members(&self, set: &str) -> HashSet<String> {
        let state = self.state.lock().await;
        state.sets.get(set).cloned().unwrap_or_default()
    }

    /// Add `value` to a set. Returns 1 if it was not already a member.
    pub async fn set_add(&self, set: &str, value: &str) -> usize {
        let mut state = self.state.lock().await;
        let inserted = state
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(value.to_string());
        usize::from(inserted)
    }

    /// Every `(channel, message)` published so far, oldest first.
    pub async fn published(&self) -> Vec<(String, String)> {
        self.state.lock().await.published.clone()
    }

    /// Make the next `times` calls of `op` fail with a connection error.
    pub async fn fail_next(&self, op: StoreOp, times: usize) {
        self.fail_after(op, 0, times).await;
    }

    /// Let `skip` calls of `op` through, then fail the following `times`.
    pub async fn fail_after(&self, op: StoreOp, skip: usize, times: usize) {
        self.state
            .lock()
            .await
            .failures
            .insert(op, Injected { skip, times });
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn move_blocking(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let deadline = tokio::time::Instant::now() + timeout;
        self.state.lock().await.check(StoreOp::MoveBlocking)?;
        loop {
            // Register interest before looking, so a push between the check
            // and the wait is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let moved = {
                let mut state = self.state.lock().await;
                state.pop_tail_push_head(src, dst)
            };
            if let Some(value) = moved {
                self.notify.notify_waiters();
                return Ok(Some(value));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn move_nonblocking(&self, src: &str, dst: &str) -> Result<Option<String>, StoreError> {
        let moved = {
            let mut state = self.state.lock().await;
            state.check(StoreOp::MoveNonblocking)?;
            state.pop_tail_push_head(src, dst)
        };
        if moved.is_some() {
            self.notify.notify_waiters();
        }
        Ok(moved)
    }

    async fn push_head(&self, queue: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock().await;
            state.check(StoreOp::PushHead)?;
            state
                .lists
                .entry(queue.to_string())
                .or_default()
                .push_front(value.to_string());
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn remove_matching(
        &self,
        queue: &str,
        value: &str,
        count: usize,
    ) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        state.check(StoreOp::RemoveMatching)?;
        let Some(list) = state.lists.get_mut(queue) else {
            return Ok(0);
        };
        // LREM with a positive count scans head to tail.
        let mut removed = 0;
        list.retain(|v| {
            if removed < count && v == value {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn set_remove(&self, set: &str, value: &str) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        state.check(StoreOp::SetRemove)?;
        let removed = state
            .sets
            .get_mut(set)
            .map(|s| s.remove(value))
            .unwrap_or(false);
        Ok(usize::from(removed))
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.check(StoreOp::Publish)?;
        state
            .published
            .push((channel.to_string(), message.to_string()));
        Ok(())
    }
}
