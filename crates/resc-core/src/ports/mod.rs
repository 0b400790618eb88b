//! Ports - boundaries to the outside world.
//!
//! The store and the task body are external collaborators; the worker only
//! sees them through these traits.

pub mod executor;
pub mod queue_store;

pub use self::executor::TaskExecutor;
pub use self::queue_store::QueueStore;
