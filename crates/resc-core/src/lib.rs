//! resc-core
//!
//! Reliable queue worker: reserve task references from a shared queue,
//! execute them, acknowledge them, and recover whatever a crashed worker
//! left behind.
//!
//! # Modules
//! - **domain**: task references, outcomes, worker state, errors
//! - **ports**: `QueueStore` and `TaskExecutor`
//! - **impls**: in-memory and Redis stores, simulated executor
//! - **app**: reservation manager, worker loop, builder, worker group
//! - **config**: worker configuration
//! - **observability**: worker counters

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
