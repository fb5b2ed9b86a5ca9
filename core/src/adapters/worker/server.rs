//! Worker-side request loop.
//!
//! Runs inside the out-of-process worker: reads requests from the parent,
//! dispatches each one to the [`DriverHost`] on its own task and writes the
//! resulting events back.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::protocol::{
    fits_in_frame, read_frame, write_frame, Envelope, WorkerEvent, WorkerRequest, READY_ID,
};
use crate::error::BackendError;
use crate::ports::DriverHost;

/// Serve requests until the reader reaches end of stream.
///
/// Emits a `Ready` event before reading anything, which is what the
/// launcher waits on.
pub async fn serve<R, W, H>(mut reader: R, writer: W, host: Arc<H>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    H: DriverHost,
{
    let writer = Arc::new(Mutex::new(writer));

    send(
        &writer,
        READY_ID,
        WorkerEvent::Ready {
            version: crate::VERSION.to_string(),
        },
        &[],
    )
    .await?;
    info!("Scan worker ready");

    while let Some((envelope, _)) = read_frame::<_, Envelope<WorkerRequest>>(&mut reader).await? {
        let id = envelope.id;
        let writer = Arc::clone(&writer);
        let task = tokio::spawn({
            let writer = Arc::clone(&writer);
            let host = Arc::clone(&host);
            async move { handle(envelope, &*host, &writer).await }
        });

        tokio::spawn(async move {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(id, error = %e, "Failed to write worker response"),
                Err(e) => {
                    error!(id, error = %e, "Worker request task failed");
                    let error = BackendError::Driver(format!("Scan worker request failed: {}", e));
                    if let Err(e) = send(&writer, id, WorkerEvent::Failed { error }, &[]).await {
                        warn!(id, error = %e, "Failed to report worker task failure");
                    }
                }
            }
        });
    }

    info!("Parent closed the request channel, worker exiting");
    Ok(())
}

async fn handle<H, W>(
    envelope: Envelope<WorkerRequest>,
    host: &H,
    writer: &Mutex<W>,
) -> io::Result<()>
where
    H: DriverHost,
    W: AsyncWrite + Unpin,
{
    let id = envelope.id;

    match envelope.message {
        WorkerRequest::ListDevices { driver } => {
            debug!(id, driver = %driver, "Listing devices");
            let event = match host.list_devices(driver).await {
                Ok(devices) => WorkerEvent::Devices { devices },
                Err(error) => WorkerEvent::Failed { error },
            };
            send(writer, id, event, &[]).await
        }
        WorkerRequest::Scan { request } => {
            debug!(id, device = %request.device, dpi = request.dpi, "Starting scan");
            match host.scan(&request).await {
                Ok(pages) => {
                    for (i, page) in pages.iter().enumerate() {
                        let index = i as u32 + 1;
                        if !fits_in_frame(page.len()) {
                            warn!(id, page = index, bytes = page.len(), "Page exceeds frame limit");
                            let error = BackendError::Driver(format!(
                                "Page {} is too large to transfer ({} bytes)",
                                index,
                                page.len()
                            ));
                            return send(writer, id, WorkerEvent::Failed { error }, &[]).await;
                        }
                        if let Err(e) = send(writer, id, WorkerEvent::Page { index }, page).await {
                            warn!(id, page = index, error = %e, "Failed to send page");
                            let error = BackendError::Driver(format!(
                                "Page {} could not be transferred: {}",
                                index, e
                            ));
                            return send(writer, id, WorkerEvent::Failed { error }, &[]).await;
                        }
                    }
                    send(
                        writer,
                        id,
                        WorkerEvent::ScanComplete {
                            pages: pages.len() as u32,
                        },
                        &[],
                    )
                    .await
                }
                Err(error) => send(writer, id, WorkerEvent::Failed { error }, &[]).await,
            }
        }
    }
}

async fn send<W: AsyncWrite + Unpin>(
    writer: &Mutex<W>,
    id: u64,
    message: WorkerEvent,
    payload: &[u8],
) -> io::Result<()> {
    let mut writer = writer.lock().await;
    write_frame(&mut *writer, &Envelope { id, message }, payload).await
}
