//! RedisQueueStore - QueueStore backed by Redis lists and sets.
//!
//! | primitive          | command                  |
//! |--------------------|--------------------------|
//! | `move_blocking`    | `BRPOPLPUSH src dst t`   |
//! | `move_nonblocking` | `RPOPLPUSH src dst`      |
//! | `push_head`        | `LPUSH`                  |
//! | `remove_matching`  | `LREM key count value`   |
//! | `set_remove`       | `SREM` or `ZREM`         |
//! | `publish`          | `PUBLISH`                |
//!
//! The connection is a `ConnectionManager`, which transparently reconnects
//! after the link drops. The command that hit the broken link still fails
//! and is retried by the worker loop.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, instrument};

use crate::config::PendingSetKind;
use crate::domain::StoreError;
use crate::ports::QueueStore;

#[derive(Clone)]
pub struct RedisQueueStore {
    con: ConnectionManager,
    pending_set_kind: PendingSetKind,
}

impl RedisQueueStore {
    /// Connect to `redis_url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(
        redis_url: &str,
        pending_set_kind: PendingSetKind,
    ) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let con = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        debug!("got redis connection to {redis_url}");
        Ok(Self {
            con,
            pending_set_kind,
        })
    }

    async fn query<T: redis::FromRedisValue>(
        &self,
        cmd: &redis::Cmd,
        name: &str,
    ) -> Result<T, StoreError> {
        let mut con = self.con.clone();
        cmd.query_async::<_, T>(&mut con).await.map_err(|e| {
            if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
                StoreError::Connection(format!("{name} failed: {e}"))
            } else {
                StoreError::Command(format!("{name} failed: {e}"))
            }
        })
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    #[instrument(skip(self), err)]
    async fn move_blocking(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        // A zero timeout means "block forever" to Redis.
        let secs = timeout.as_secs_f64().max(0.001);
        let mut cmd = redis::cmd("BRPOPLPUSH");
        cmd.arg(src).arg(dst).arg(secs);
        self.query(&cmd, "BRPOPLPUSH").await
    }

    async fn move_nonblocking(&self, src: &str, dst: &str) -> Result<Option<String>, StoreError> {
        let mut cmd = redis::cmd("RPOPLPUSH");
        cmd.arg(src).arg(dst);
        self.query(&cmd, "RPOPLPUSH").await
    }

    async fn push_head(&self, queue: &str, value: &str) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("LPUSH");
        cmd.arg(queue).arg(value);
        let _len: i64 = self.query(&cmd, "LPUSH").await?;
        Ok(())
    }

    async fn remove_matching(
        &self,
        queue: &str,
        value: &str,
        count: usize,
    ) -> Result<usize, StoreError> {
        let mut cmd = redis::cmd("LREM");
        cmd.arg(queue).arg(count).arg(value);
        self.query(&cmd, "LREM").await
    }

    async fn set_remove(&self, set: &str, value: &str) -> Result<usize, StoreError> {
        let name = match self.pending_set_kind {
            PendingSetKind::Set => "SREM",
            PendingSetKind::SortedSet => "ZREM",
        };
        let mut cmd = redis::cmd(name);
        cmd.arg(set).arg(value);
        self.query(&cmd, name).await
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("PUBLISH");
        cmd.arg(channel).arg(message);
        let _receivers: i64 = self.query(&cmd, "PUBLISH").await?;
        Ok(())
    }
}
