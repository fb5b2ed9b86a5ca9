//! Parent-side connection to a scan worker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::protocol::{read_frame, write_frame, Envelope, WorkerEvent, WorkerRequest};
use crate::domain::{Device, DriverId, PageImage, ScanRequest};
use crate::error::{BackendError, BackendResult};
use crate::ports::{PageSender, PageStream, ScanBackend};

/// Boxed read half of a worker connection.
pub type WorkerReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed write half of a worker connection.
pub type WorkerWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Pages buffered between the worker connection and the scan session.
const PAGE_BUFFER: usize = 4;

struct Inbound {
    event: WorkerEvent,
    payload: Vec<u8>,
}

type PendingMap = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<Inbound>>>>;

/// A live, shareable connection to one worker process.
///
/// Requests are multiplexed by id; a background task routes the worker's
/// events to whichever request they belong to. Dropping the client stops
/// the routing task and, through `kill_on_drop`, the worker process.
pub struct WorkerClient {
    writer: tokio::sync::Mutex<WorkerWriter>,
    pending: PendingMap,
    next_id: AtomicU64,
    alive: Arc<AtomicBool>,
    worker_version: String,
    router: JoinHandle<()>,
    _child: Mutex<Option<Child>>,
}

impl WorkerClient {
    /// Wait for the worker's `Ready` event, then start routing its events.
    pub async fn connect(
        mut reader: WorkerReader,
        writer: WorkerWriter,
        child: Option<Child>,
    ) -> BackendResult<Self> {
        let first = read_frame::<_, Envelope<WorkerEvent>>(&mut reader)
            .await
            .map_err(|e| BackendError::Unavailable(format!("Failed to read from worker: {}", e)))?;

        let worker_version = match first {
            Some((
                Envelope {
                    message: WorkerEvent::Ready { version },
                    ..
                },
                _,
            )) => version,
            Some((other, _)) => {
                return Err(BackendError::Unavailable(format!(
                    "Worker sent {:?} before becoming ready",
                    other.message
                )))
            }
            None => {
                return Err(BackendError::Unavailable(
                    "Worker exited before becoming ready".to_string(),
                ))
            }
        };
        info!(version = %worker_version, "Scan worker connected");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let router = tokio::spawn(route_events(
            reader,
            Arc::clone(&pending),
            Arc::clone(&alive),
        ));

        Ok(Self {
            writer: tokio::sync::Mutex::new(writer),
            pending,
            // 0 is reserved for the Ready event.
            next_id: AtomicU64::new(1),
            alive,
            worker_version,
            router,
            _child: Mutex::new(child),
        })
    }

    /// Version string reported by the worker.
    pub fn worker_version(&self) -> &str {
        &self.worker_version
    }

    async fn request(&self, message: WorkerRequest) -> BackendResult<Subscription> {
        if !self.is_alive() {
            return Err(BackendError::Unavailable(
                "Worker connection is closed".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.lock().insert(id, tx);
        let subscription = Subscription {
            id,
            rx,
            pending: Arc::clone(&self.pending),
        };

        // The router may have shut down between the check above and the insert.
        if !self.is_alive() {
            return Err(BackendError::Unavailable(
                "Worker connection is closed".to_string(),
            ));
        }

        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &Envelope { id, message }, &[])
            .await
            .map_err(|e| {
                self.alive.store(false, Ordering::SeqCst);
                BackendError::Unavailable(format!("Failed to write to worker: {}", e))
            })?;

        Ok(subscription)
    }
}

impl Drop for WorkerClient {
    fn drop(&mut self) {
        self.router.abort();
    }
}

impl ScanBackend for WorkerClient {
    async fn list_devices(&self, driver: DriverId) -> BackendResult<Vec<Device>> {
        let mut subscription = self.request(WorkerRequest::ListDevices { driver }).await?;

        match subscription.recv().await? {
            Inbound {
                event: WorkerEvent::Devices { devices },
                ..
            } => Ok(devices),
            Inbound {
                event: WorkerEvent::Failed { error },
                ..
            } => Err(error),
            Inbound { event, .. } => Err(BackendError::Driver(format!(
                "Unexpected worker reply to device listing: {:?}",
                event
            ))),
        }
    }

    async fn scan(&self, request: &ScanRequest) -> BackendResult<PageStream> {
        let subscription = self
            .request(WorkerRequest::Scan {
                request: request.clone(),
            })
            .await?;

        let (tx, stream) = PageStream::channel(PAGE_BUFFER);
        tokio::spawn(forward_pages(subscription, tx, request.dpi));
        Ok(stream)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Events for one request. Unregisters itself when dropped.
struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Inbound>,
    pending: PendingMap,
}

impl Subscription {
    async fn recv(&mut self) -> BackendResult<Inbound> {
        self.rx.recv().await.ok_or_else(|| {
            BackendError::Unavailable("Worker connection closed mid-request".to_string())
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

async fn route_events(mut reader: WorkerReader, pending: PendingMap, alive: Arc<AtomicBool>) {
    loop {
        match read_frame::<_, Envelope<WorkerEvent>>(&mut reader).await {
            Ok(Some((envelope, payload))) => {
                let tx = pending.lock().get(&envelope.id).cloned();
                match tx {
                    Some(tx) => {
                        let _ = tx.send(Inbound {
                            event: envelope.message,
                            payload,
                        });
                    }
                    None => debug!(id = envelope.id, "Dropping event for unknown request"),
                }
            }
            Ok(None) => {
                warn!("Scan worker closed its output");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Lost connection to scan worker");
                break;
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiting request with a closed channel.
    pending.lock().clear();
}

async fn forward_pages(mut subscription: Subscription, tx: PageSender, dpi: u32) {
    loop {
        let item = match subscription.recv().await {
            Ok(Inbound {
                event: WorkerEvent::Page { index },
                payload,
            }) => decode_page(index, dpi, &payload),
            Ok(Inbound {
                event: WorkerEvent::ScanComplete { pages },
                ..
            }) => {
                debug!(pages, "Worker finished scan");
                return;
            }
            Ok(Inbound {
                event: WorkerEvent::Failed { error },
                ..
            }) => {
                let _ = tx.send(Err(error)).await;
                return;
            }
            Ok(Inbound { event, .. }) => Err(BackendError::Driver(format!(
                "Unexpected worker event during scan: {:?}",
                event
            ))),
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            // Consumer gave up, or the stream is poisoned.
            return;
        }
    }
}

fn decode_page(index: u32, dpi: u32, payload: &[u8]) -> BackendResult<PageImage> {
    image::load_from_memory(payload)
        .map(|image| PageImage::new(index, dpi, image))
        .map_err(|e| BackendError::Driver(format!("Page {} could not be decoded: {}", index, e)))
}
