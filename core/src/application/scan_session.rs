//! One acquisition run against one device.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{ErrorTranslator, HeuristicErrorTranslator, WorkerProcessManager};
use crate::domain::{DeviceRef, PageImage, ScanOptions, ScanRequest};
use crate::error::{BackendError, Error, Result, ScanOrchestrationError};
use crate::ports::{ScanBackend, WorkerLauncher};

/// Runs scan jobs and collects their pages in acquisition order.
///
/// At most one run holds a given device at a time. A second run for the
/// same device fails at once with `DeviceBusy` instead of queuing.
pub struct ScanSession<L: WorkerLauncher> {
    manager: Arc<WorkerProcessManager<L>>,
    translator: Arc<dyn ErrorTranslator>,
    device_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<L: WorkerLauncher> ScanSession<L> {
    pub fn new(manager: Arc<WorkerProcessManager<L>>) -> Self {
        Self::with_translator(manager, Arc::new(HeuristicErrorTranslator::new()))
    }

    pub fn with_translator(
        manager: Arc<WorkerProcessManager<L>>,
        translator: Arc<dyn ErrorTranslator>,
    ) -> Self {
        Self {
            manager,
            translator,
            device_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Validate, dispatch and drain one scan.
    ///
    /// Zero pages is a successful outcome. Backend failures are classified
    /// here and nowhere else.
    pub async fn run(&self, options: ScanOptions) -> Result<Vec<PageImage>> {
        let request = ScanRequest::validate(options)?;
        let session_id = Uuid::new_v4();
        let span = info_span!(
            "scan_session",
            session = %session_id,
            device = %request.device,
            dpi = request.dpi,
        );
        self.run_validated(request).instrument(span).await
    }

    async fn run_validated(&self, request: ScanRequest) -> Result<Vec<PageImage>> {
        let _lease = self.lock_device(&request.device)?;
        let backend = self.manager.acquire().await?;

        info!(source = ?request.paper_source, "Starting scan");
        let mut stream = backend
            .scan(&request)
            .await
            .map_err(|e| self.classify(&e))?;

        let mut pages = Vec::new();
        while let Some(page) = stream.next_page().await {
            let page = page.map_err(|e| self.classify(&e))?;
            debug!(page = page.index, width = page.width(), height = page.height(), "Page acquired");
            pages.push(page);
        }

        info!(pages = pages.len(), "Scan finished");
        Ok(pages)
    }

    fn classify(&self, raw: &BackendError) -> Error {
        let classified = self.translator.classify(raw);
        warn!(code = %classified.code, error = %classified.message, "Scan failed");
        classified.into()
    }

    /// Take the device for the rest of the run. Released when the lease drops.
    fn lock_device(&self, device: &DeviceRef) -> Result<DeviceLease<'_>> {
        let key = device.lock_key();
        let mut locks = self.device_locks.lock();
        let lock = Arc::clone(locks.entry(key.clone()).or_default());

        // Locked under the map lock, so only lease holders keep a clone.
        match lock.try_lock_owned() {
            Ok(guard) => Ok(DeviceLease {
                locks: &self.device_locks,
                key,
                guard: Some(guard),
            }),
            Err(_) => {
                warn!(device = %device, "Device is already scanning");
                Err(ScanOrchestrationError::device_busy(format!(
                    "Device {} is busy with another scan",
                    device
                ))
                .into())
            }
        }
    }
}

/// Exclusive hold on one device. Dropping it frees the device and removes
/// its map entry.
struct DeviceLease<'a> {
    locks: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DeviceLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        self.guard.take();
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
