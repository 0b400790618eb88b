//! App - the worker built out of the ports.
//!
//! # Components
//! - **ReservationManager**: recover / reserve / release pending / acknowledge
//! - **WorkerLoop**: the per-worker state machine
//! - **WorkerBuilder**: validated wiring
//! - **WorkerGroup**: spawned loops + shutdown
//! - **RetryPolicy**: backoff for store failures

pub mod builder;
pub mod group;
pub mod reservation;
pub mod retry;
pub mod worker_loop;

pub use self::builder::{BuildError, WorkerBuilder};
pub use self::group::WorkerGroup;
pub use self::reservation::ReservationManager;
pub use self::retry::RetryPolicy;
pub use self::worker_loop::WorkerLoop;
