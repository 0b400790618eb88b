//! QueueStore port - atomic list/set primitives of the shared store.
//!
//! Lists have a head and a tail. Producers push to the head, workers take
//! from the tail, so a list read head-to-tail is newest-to-oldest.
//!
//! # Implementations
//! - `InMemoryQueueStore` (tests, development)
//! - `RedisQueueStore` (production, `redis` feature)

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::StoreError;

/// Store primitives the reservation protocol is built on.
///
/// Every method is a single atomic operation on the store. Correctness under
/// several workers depends on `move_blocking` and `move_nonblocking` being
/// atomic: a value is never observably absent from both lists.
///
/// Only `move_blocking` may wait (up to `timeout`); everything else returns
/// promptly.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Pop the tail of `src` and push it onto the head of `dst`, waiting up to
    /// `timeout` for `src` to become non-empty.
    async fn move_blocking(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError>;

    /// Same as `move_blocking`, returning `None` immediately if `src` is empty.
    async fn move_nonblocking(&self, src: &str, dst: &str) -> Result<Option<String>, StoreError>;

    async fn push_head(&self, queue: &str, value: &str) -> Result<(), StoreError>;

    /// Remove up to `count` entries equal to `value`, returning how many were
    /// removed.
    async fn remove_matching(
        &self,
        queue: &str,
        value: &str,
        count: usize,
    ) -> Result<usize, StoreError>;

    /// Remove `value` from a set. Returns 1 if it was a member, 0 otherwise.
    async fn set_remove(&self, set: &str, value: &str) -> Result<usize, StoreError>;

    /// Fire-and-forget notification on a pub/sub channel.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError>;
}
