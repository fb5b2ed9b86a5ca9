//! CLI command implementations.

pub mod config;
pub mod devices;
pub mod scan;
pub mod worker;

use std::path::PathBuf;

use anyhow::Result;
use scannerfy_core::{Config, ConfigStore, ProcessWorkerLauncher, ScanService};

/// The store at `path`, or the default one.
pub fn config_store(path: Option<PathBuf>) -> Result<ConfigStore> {
    Ok(match path {
        Some(path) => ConfigStore::with_path(path),
        None => ConfigStore::new()?,
    })
}

/// Service wired from configuration, with the worker as a child process.
pub fn build_service(config: &Config) -> Result<ScanService<ProcessWorkerLauncher>> {
    Ok(ScanService::new(
        config.worker.launcher()?,
        config.export.pipeline(),
    ))
}
