//! Out-of-process scan worker.
//!
//! The worker is a child process (by default this same executable started
//! with the `worker` subcommand) that owns all hardware access. The parent
//! talks to it over stdin/stdout using the framing in [`protocol`].
//!
//! - [`ProcessWorkerLauncher`]: spawns the worker and waits for it to be ready
//! - [`WorkerClient`]: parent-side handle, implements [`ScanBackend`]
//! - [`serve`]: worker-side request loop over a [`DriverHost`]
//!
//! [`ScanBackend`]: crate::ports::ScanBackend
//! [`DriverHost`]: crate::ports::DriverHost

mod client;
pub mod protocol;
mod server;

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::info;

pub use client::{WorkerClient, WorkerReader, WorkerWriter};
pub use server::serve;

use crate::error::{BackendError, BackendResult, Error, Result};
use crate::ports::WorkerLauncher;

/// Default time allowed for a worker to report ready.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Subcommand that puts the scannerfy binary into worker mode.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// Starts the worker as a child process.
#[derive(Debug, Clone)]
pub struct ProcessWorkerLauncher {
    program: PathBuf,
    args: Vec<String>,
    startup_timeout: Duration,
}

impl ProcessWorkerLauncher {
    /// Launch `program` with `args`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Launch the currently running executable in worker mode.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| Error::Config(format!("Could not locate own executable: {}", e)))?;
        Ok(Self::new(program, vec![WORKER_SUBCOMMAND.to_string()]))
    }

    /// Override the startup timeout.
    pub fn with_startup_timeout(mut self, startup_timeout: Duration) -> Self {
        self.startup_timeout = startup_timeout;
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl WorkerLauncher for ProcessWorkerLauncher {
    type Backend = WorkerClient;

    async fn launch(&self) -> BackendResult<WorkerClient> {
        info!(program = %self.program.display(), "Starting scan worker");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Unavailable(format!("Failed to start worker: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::Unavailable("Worker stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Unavailable("Worker stdout unavailable".to_string()))?;

        // On timeout the child is dropped with the future and killed.
        timeout(
            self.startup_timeout,
            WorkerClient::connect(Box::new(stdout), Box::new(stdin), Some(child)),
        )
        .await
        .map_err(|_| {
            BackendError::Unavailable(format!(
                "Worker did not become ready within {}s",
                self.startup_timeout.as_secs()
            ))
        })?
    }
}
