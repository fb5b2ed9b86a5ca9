//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with the scanning backend. Implementations live in `adapters`.

mod backend;
mod driver;

pub use backend::{PageSender, PageStream, ScanBackend, WorkerLauncher};
pub use driver::DriverHost;
