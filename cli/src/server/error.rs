use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scannerfy_core::{Error, ErrorCode};
use serde::Serialize;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error body: `{message, code}` for classified failures, `{message}` otherwise.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<ErrorCode>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, None)
    }

    pub fn bad_request(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, Some(code))
    }

    /// Device listing reports an unreachable backend as 503.
    pub fn from_listing(err: Error) -> Self {
        match err.code() {
            Some(ErrorCode::BackendUnavailable) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                err.to_string(),
                Some(ErrorCode::BackendUnavailable),
            ),
            _ => err.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            message: self.message,
            code: self.code,
        });

        (self.status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.code() {
            Some(code) => Self::bad_request(err.to_string(), code),
            None => {
                error!(error = %err, "Unhandled request failure");
                Self::internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scannerfy_core::ScanOrchestrationError;

    #[test]
    fn test_classified_errors_are_bad_requests() {
        let err: Error = ScanOrchestrationError::new(ErrorCode::DeviceOffline, "offline").into();
        let api = ApiError::from(err);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, Some(ErrorCode::DeviceOffline));
    }

    #[test]
    fn test_unclassified_errors_are_internal_without_code() {
        let api = ApiError::from(Error::Unhandled("task crashed".to_string()));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, None);
        assert_eq!(api.message, "Unexpected failure: task crashed");
    }

    #[test]
    fn test_listing_maps_backend_unavailable_to_503() {
        let err: Error = ScanOrchestrationError::backend_unavailable("worker gone").into();
        assert_eq!(
            ApiError::from_listing(err).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
