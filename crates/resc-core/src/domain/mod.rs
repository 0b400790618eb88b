//! Domain model (references, outcomes, worker state, errors).
//!
//! Nothing in here talks to the store.

pub mod errors;
pub mod outcome;
pub mod reference;
pub mod state;

pub use errors::{ConfigError, ExecutionError, ReferenceError, StoreError};
pub use outcome::{Outcome, OutcomeKind};
pub use reference::{TaskIdentity, TaskRef};
pub use state::WorkerState;
