//! Wire protocol between the orchestration core and the scan worker.
//!
//! Each frame is:
//!
//! ```text
//! u32 BE header length | JSON header | u32 BE payload length | payload bytes
//! ```
//!
//! The header is an [`Envelope`] carrying a request id, so several requests can be
//! in flight on one pipe. Page frames carry the PNG-encoded page as payload; every
//! other frame has an empty payload.

use std::io;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::{Device, DriverId, ScanRequest};
use crate::error::BackendError;

/// Upper bound for a single header or payload.
pub const MAX_FRAME_PART: u32 = 256 * 1024 * 1024;

/// Request id used by the worker's unsolicited `Ready` event.
pub const READY_ID: u64 = 0;

/// Frame header: a message tagged with the request it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: u64,
    pub message: T,
}

/// Messages sent to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    ListDevices { driver: DriverId },
    Scan { request: ScanRequest },
}

/// Messages sent by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerEvent {
    Ready { version: String },
    Devices { devices: Vec<Device> },
    Page { index: u32 },
    ScanComplete { pages: u32 },
    Failed { error: BackendError },
}

/// Write one frame and flush.
///
/// Oversized parts are rejected with `InvalidInput` before anything is
/// written, so the stream stays aligned on frame boundaries.
pub async fn write_frame<W, T>(writer: &mut W, header: &T, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let header = serde_json::to_vec(header)?;
    let header_len = part_len(header.len())?;
    let payload_len = part_len(payload.len())?;

    writer.write_u32(header_len).await?;
    writer.write_all(&header).await?;
    writer.write_u32(payload_len).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Whether a payload of `len` bytes fits in one frame.
pub fn fits_in_frame(len: usize) -> bool {
    part_len(len).is_ok()
}

/// Read one frame. Returns `Ok(None)` on a clean end of stream between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> io::Result<Option<(T, Vec<u8>)>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let header_len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let header = read_part(reader, header_len).await?;
    let header: T = serde_json::from_slice(&header)?;

    let payload_len = reader.read_u32().await?;
    let payload = read_part(reader, payload_len).await?;

    Ok(Some((header, payload)))
}

async fn read_part<R: AsyncRead + Unpin>(reader: &mut R, len: u32) -> io::Result<Vec<u8>> {
    if len > MAX_FRAME_PART {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame part of {} bytes exceeds limit", len),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

fn part_len(len: usize) -> io::Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|l| *l <= MAX_FRAME_PART)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame part of {} bytes exceeds limit", len),
            )
        })
}
