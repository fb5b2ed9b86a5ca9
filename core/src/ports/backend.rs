//! Scanning backend port (interface).

use std::future::Future;

use tokio::sync::mpsc;

use crate::domain::{Device, DriverId, PageImage, ScanRequest};
use crate::error::BackendResult;

/// Port for the live scanning backend (the worker handle).
///
/// Implementations must tolerate concurrent calls; device enumeration
/// for several drivers is issued in parallel against one handle.
pub trait ScanBackend: Send + Sync {
    /// Enumerate the devices visible through one driver, in backend order.
    fn list_devices(
        &self,
        driver: DriverId,
    ) -> impl Future<Output = BackendResult<Vec<Device>>> + Send;

    /// Dispatch a scan. Pages arrive on the returned stream as the device produces them.
    fn scan(&self, request: &ScanRequest)
        -> impl Future<Output = BackendResult<PageStream>> + Send;

    /// Whether the handle can still serve requests.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Port for starting a scanning backend.
pub trait WorkerLauncher: Send + Sync + 'static {
    type Backend: ScanBackend + 'static;

    /// Start the backend and wait until it is ready to serve requests.
    fn launch(&self) -> impl Future<Output = BackendResult<Self::Backend>> + Send;
}

/// Producer half of a [`PageStream`].
pub type PageSender = mpsc::Sender<BackendResult<PageImage>>;

/// Lazy, finite, non-restartable sequence of pages from one scan.
///
/// The device is the only producer; once a page is taken it cannot be
/// re-acquired without a new physical scan. The stream ends when the
/// producer side is dropped.
#[derive(Debug)]
pub struct PageStream {
    rx: mpsc::Receiver<BackendResult<PageImage>>,
}

impl PageStream {
    /// Create a bounded stream and its producer.
    pub fn channel(buffer: usize) -> (PageSender, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }

    /// Stream over an already-known sequence of results.
    pub fn from_results(results: Vec<BackendResult<PageImage>>) -> Self {
        let (tx, stream) = Self::channel(results.len());
        for result in results {
            // Capacity equals the number of items, so this cannot fail.
            let _ = tx.try_send(result);
        }
        stream
    }

    /// Take the next page, or `None` once the scan is finished.
    pub async fn next_page(&mut self) -> Option<BackendResult<PageImage>> {
        self.rx.recv().await
    }
}
