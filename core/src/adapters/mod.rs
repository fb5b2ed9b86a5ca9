//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! - `worker`: the out-of-process worker (launcher, client, wire protocol, serve loop)
//! - `drivers`: hardware access used inside the worker

pub mod drivers;
pub mod worker;

// Re-export main types for convenience
pub use drivers::DriverSet;
pub use worker::{ProcessWorkerLauncher, WorkerClient};
