//! Lifecycle of the shared scanning backend.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Result, ScanOrchestrationError};
use crate::ports::{ScanBackend, WorkerLauncher};

/// Owns the one live backend handle and starts it on first use.
///
/// Starting a worker takes seconds, so the handle is kept and shared by
/// every later call. The manager is an ordinary value: whoever builds the
/// service decides which launcher it gets, and tests inject a mock.
pub struct WorkerProcessManager<L: WorkerLauncher> {
    launcher: L,
    handle: Mutex<Option<Arc<L::Backend>>>,
}

impl<L: WorkerLauncher> WorkerProcessManager<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            handle: Mutex::new(None),
        }
    }

    /// Return the live backend handle, starting the worker if needed.
    ///
    /// Concurrent first callers wait for the same launch. A handle whose
    /// worker has exited is replaced by a fresh launch.
    pub async fn acquire(&self) -> Result<Arc<L::Backend>> {
        let mut handle = self.handle.lock().await;

        if let Some(backend) = handle.as_ref() {
            if backend.is_alive() {
                return Ok(Arc::clone(backend));
            }
            warn!("Scan worker is no longer alive, restarting it");
            *handle = None;
        }

        let backend = self.launcher.launch().await.map_err(|e| {
            warn!(error = %e, "Scan worker failed to start");
            ScanOrchestrationError::backend_unavailable(e.to_string())
        })?;
        info!("Scan worker is ready");

        let backend = Arc::new(backend);
        *handle = Some(Arc::clone(&backend));
        Ok(backend)
    }

    /// Make sure the worker is running, without doing anything with it.
    pub async fn ensure_backend_ready(&self) -> Result<()> {
        self.acquire().await.map(|_| ())
    }

    /// Whether a live handle is currently held.
    pub async fn is_ready(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|b| b.is_alive())
    }
}
