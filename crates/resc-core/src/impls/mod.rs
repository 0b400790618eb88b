//! Impls - implementations of the ports.
//!
//! - **InMemoryQueueStore**: development/test store
//! - **RedisQueueStore**: production store (`redis` feature)
//! - **SimulatedWorkExecutor**: stub task body

pub mod inmem_store;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod simulated;

pub use self::inmem_store::{InMemoryQueueStore, StoreOp};
#[cfg(feature = "redis")]
pub use self::redis_store::RedisQueueStore;
pub use self::simulated::{SimulatedWork, SimulatedWorkExecutor};
