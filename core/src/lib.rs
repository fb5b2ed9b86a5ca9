//! Scannerfy Core Library
//!
//! Scan orchestration for network-reachable scanners. Provides functionality to:
//! - Enumerate devices across several driver backends concurrently
//! - Run scan sessions against an out-of-process worker
//! - Export the scanned pages as images or a PDF document
//! - Translate backend failures into a stable error taxonomy
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure data models (drivers, devices, requests, pages, artifacts)
//! - `ports`: Trait definitions (interfaces) for the backend seams
//! - `adapters`: The worker process and the drivers it hosts
//! - `application`: Use case services
//!
//! # Platform Support
//! - Linux/BSD: SANE and eSCL through `scanimage`
//! - macOS: SANE and eSCL through `scanimage` (ImageCaptureCore planned)
//! - Windows: eSCL only where `scanimage` is installed (WIA/TWAIN planned)

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;
pub mod net;

#[cfg(test)]
pub(crate) mod testing;

// Re-export domain types (primary API)
pub use domain::{
    driver_registry, Device, DeviceRef, DriverId, ExportArtifact, ImageExportFormat, PageImage,
    PageSize, PaperSource, ScanOptions, ScanRequest,
};

// Re-export other commonly used types
pub use adapters::{DriverSet, ProcessWorkerLauncher, WorkerClient};
pub use application::{
    DeviceDirectory, ErrorTranslator, ExportPipeline, HeuristicErrorTranslator, ScanService,
    ScanSession, WorkerProcessManager,
};
pub use config::{Config, ConfigStore, ExportConfig, WorkerConfig};
pub use error::{BackendError, Error, ErrorCode, Result, ScanOrchestrationError};

/// Version reported by the worker in its ready handshake.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
