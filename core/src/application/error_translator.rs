//! Classification of raw backend failures into stable error codes.
//!
//! Backends report failures as free text, so [`HeuristicErrorTranslator`]
//! matches known substrings. This is fragile across backend versions and
//! locales; callers depend only on [`ErrorTranslator`], so a translator
//! built on structured backend codes can replace it.

use tracing::debug;

use crate::error::{BackendError, ErrorCode, ScanOrchestrationError};

/// Maps a raw backend failure to a caller-facing error. Applied once, at the
/// boundary where the failure leaves the backend.
pub trait ErrorTranslator: Send + Sync {
    fn classify(&self, raw: &BackendError) -> ScanOrchestrationError;
}

/// Substring heuristics over backend diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicErrorTranslator;

/// Markers that a message talks about a device identifier.
const DEVICE_ID_MARKERS: &[&str] = &["device id", "deviceid", "device_id"];

impl HeuristicErrorTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Classify diagnostic text. First match wins.
    pub fn classify_text(&self, text: &str) -> ErrorCode {
        let lowered = text.to_lowercase();

        if lowered.contains("offline") {
            return ErrorCode::DeviceOffline;
        }

        if DEVICE_ID_MARKERS.iter().any(|m| lowered.contains(m)) && lowered.contains("specified") {
            return ErrorCode::DeviceNotFound;
        }

        ErrorCode::DeviceGenericFailure
    }
}

impl ErrorTranslator for HeuristicErrorTranslator {
    fn classify(&self, raw: &BackendError) -> ScanOrchestrationError {
        let code = match raw {
            // Structural, not textual: the worker itself is gone.
            BackendError::Unavailable(_) => ErrorCode::BackendUnavailable,
            BackendError::Driver(_) | BackendError::Unsupported(_) => {
                self.classify_text(&raw.to_string())
            }
        };
        debug!(code = %code, raw = %raw, "Classified backend failure");
        ScanOrchestrationError::new(code, raw.to_string())
    }
}
