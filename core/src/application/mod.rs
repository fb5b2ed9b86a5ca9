//! Application layer - Use case services.
//!
//! The services here orchestrate domain types through the ports; none of
//! them touches a process, pipe or driver directly.

mod device_directory;
mod error_translator;
mod export_pipeline;
mod scan_service;
mod scan_session;
mod worker_manager;

pub use device_directory::DeviceDirectory;
pub use error_translator::{ErrorTranslator, HeuristicErrorTranslator};
pub use export_pipeline::{ExportPipeline, DEFAULT_JPEG_QUALITY};
pub use scan_service::{artifact_stem, ScanService};
pub use scan_session::ScanSession;
pub use worker_manager::WorkerProcessManager;
