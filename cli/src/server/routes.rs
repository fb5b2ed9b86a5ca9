use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use scannerfy_core::ports::WorkerLauncher;
use scannerfy_core::{
    Device, DeviceRef, DriverId, ErrorCode, ExportArtifact, PaperSource, ScanOptions, ScanService,
};
use serde::{Deserialize, Serialize};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::error;

use super::error::{ApiError, ApiResult};

type AppState<L> = Arc<ScanService<L>>;

pub fn router<L: WorkerLauncher>(service: AppState<L>) -> Router {
    Router::new()
        .route("/devices", get(list_devices::<L>))
        .route("/scan-image", post(scan_image::<L>))
        .route("/scan-images", post(scan_images::<L>))
        .route("/scan-images-as-document", post(scan_images_as_document::<L>))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanBody {
    device_id: Option<String>,
    driver_id: Option<DriverId>,
    #[serde(default)]
    dpi: i64,
    #[serde(default)]
    paper_source: PaperSource,
}

impl From<ScanBody> for ScanOptions {
    fn from(body: ScanBody) -> Self {
        let device = match (body.driver_id, body.device_id) {
            (Some(driver), Some(id)) => Some(DeviceRef::new(driver, id)),
            _ => None,
        };
        ScanOptions::new(device, body.dpi, body.paper_source)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDto {
    file_name: String,
    mime_type: &'static str,
    data: String,
}

impl From<ExportArtifact> for ArtifactDto {
    fn from(artifact: ExportArtifact) -> Self {
        Self {
            data: STANDARD.encode(&artifact.bytes),
            file_name: artifact.suggested_file_name,
            mime_type: artifact.mime_type,
        }
    }
}

fn scan_options(payload: Result<Json<ScanBody>, JsonRejection>) -> ApiResult<ScanOptions> {
    let Json(body) = payload
        .map_err(|e| ApiError::bad_request(e.body_text(), ErrorCode::InvalidScanRequest))?;
    Ok(body.into())
}

fn file_response(artifact: ExportArtifact) -> Response {
    let headers = [
        (header::CONTENT_TYPE, artifact.mime_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.suggested_file_name),
        ),
    ];
    (headers, artifact.bytes).into_response()
}

async fn list_devices<L: WorkerLauncher>(
    State(service): State<AppState<L>>,
) -> ApiResult<Json<Vec<Device>>> {
    let devices = service
        .list_devices()
        .await
        .map_err(ApiError::from_listing)?;
    Ok(Json(devices))
}

async fn scan_image<L: WorkerLauncher>(
    State(service): State<AppState<L>>,
    payload: Result<Json<ScanBody>, JsonRejection>,
) -> ApiResult<Response> {
    let artifact = service.scan_image(scan_options(payload)?).await?;
    Ok(file_response(artifact))
}

async fn scan_images<L: WorkerLauncher>(
    State(service): State<AppState<L>>,
    payload: Result<Json<ScanBody>, JsonRejection>,
) -> ApiResult<Json<Vec<ArtifactDto>>> {
    let artifacts = service.scan_images(scan_options(payload)?).await?;
    Ok(Json(artifacts.into_iter().map(ArtifactDto::from).collect()))
}

async fn scan_images_as_document<L: WorkerLauncher>(
    State(service): State<AppState<L>>,
    payload: Result<Json<ScanBody>, JsonRejection>,
) -> ApiResult<Response> {
    let artifact = service
        .scan_images_as_document(scan_options(payload)?)
        .await?;
    Ok(file_response(artifact))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "Request handler panicked");
    ApiError::internal("Internal server error").into_response()
}
