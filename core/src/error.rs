//! Error types for the scannerfy-core library.
//!
//! Three layers of failure exist:
//! - [`BackendError`]: raw failures surfaced by the scanning backend (worker or driver).
//! - [`ScanOrchestrationError`]: a classified, caller-facing failure with a stable code.
//! - [`Error`]: the crate-wide error, wrapping the above plus internal failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DriverId;

/// Result type alias for scannerfy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for raw backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Stable, caller-facing error codes.
///
/// Serialized as the variant name (e.g. `"DeviceOffline"`), which is the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The worker or backend is unreachable or failed to start.
    BackendUnavailable,
    /// The device is known but offline.
    DeviceOffline,
    /// The device id could not be resolved by the backend.
    DeviceNotFound,
    /// Another scan currently holds the device.
    DeviceBusy,
    /// Any other device-side failure.
    DeviceGenericFailure,
    /// The scan finished without producing a page.
    NoImagesProduced,
    /// Encoding or staging of the output failed.
    ExportFailed,
    /// The scan request was rejected before dispatch.
    InvalidScanRequest,
}

impl ErrorCode {
    /// The stable string form of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BackendUnavailable => "BackendUnavailable",
            ErrorCode::DeviceOffline => "DeviceOffline",
            ErrorCode::DeviceNotFound => "DeviceNotFound",
            ErrorCode::DeviceBusy => "DeviceBusy",
            ErrorCode::DeviceGenericFailure => "DeviceGenericFailure",
            ErrorCode::NoImagesProduced => "NoImagesProduced",
            ErrorCode::ExportFailed => "ExportFailed",
            ErrorCode::InvalidScanRequest => "InvalidScanRequest",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified scan or export failure.
///
/// `message` is diagnostic text for humans and may contain backend output;
/// `code` never does.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ScanOrchestrationError {
    pub code: ErrorCode,
    pub message: String,
}

impl ScanOrchestrationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendUnavailable, message)
    }

    pub fn device_busy(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeviceBusy, message)
    }

    pub fn no_images_produced() -> Self {
        Self::new(
            ErrorCode::NoImagesProduced,
            "The scan finished without producing any pages",
        )
    }

    pub fn export_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExportFailed, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidScanRequest, message)
    }
}

/// Raw failure reported by the scanning backend.
///
/// Serializable because the worker ships it back over the wire unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum BackendError {
    /// The worker could not be started, reached, or has exited.
    #[error("Scan worker unavailable: {0}")]
    Unavailable(String),

    /// Free-text diagnostics from a driver.
    #[error("{0}")]
    Driver(String),

    /// The driver exists but is not available on this host.
    #[error("Driver {0} is not supported on this host")]
    Unsupported(DriverId),
}

/// Errors that can occur anywhere in the orchestration core.
#[derive(Error, Debug)]
pub enum Error {
    /// Classified scan/export failure with a stable code.
    #[error(transparent)]
    Scan(#[from] ScanOrchestrationError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A failure with no place in the taxonomy (e.g. a crashed blocking task).
    #[error("Unexpected failure: {0}")]
    Unhandled(String),
}

impl Error {
    /// The stable code, if this error belongs to the taxonomy.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Scan(e) => Some(e.code),
            _ => None,
        }
    }
}
