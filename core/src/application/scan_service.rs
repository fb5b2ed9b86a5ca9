//! Facade over discovery, scanning and export.

use std::sync::Arc;

use tracing::{error, info};

use super::{DeviceDirectory, ExportPipeline, ScanSession, WorkerProcessManager};
use crate::domain::{driver_registry, Device, DriverId, ExportArtifact, PageImage, ScanOptions};
use crate::error::{Error, Result, ScanOrchestrationError};
use crate::ports::WorkerLauncher;

/// File stem for artifacts produced now.
pub fn artifact_stem() -> String {
    chrono::Local::now().format("scan-%Y%m%d-%H%M%S").to_string()
}

/// The use cases exposed to callers: list devices, and scan into one of
/// the three export shapes.
pub struct ScanService<L: WorkerLauncher> {
    manager: Arc<WorkerProcessManager<L>>,
    directory: DeviceDirectory<L>,
    session: ScanSession<L>,
    pipeline: ExportPipeline,
}

impl<L: WorkerLauncher> ScanService<L> {
    pub fn new(launcher: L, pipeline: ExportPipeline) -> Self {
        Self::with_drivers(launcher, pipeline, driver_registry().to_vec())
    }

    pub fn with_drivers(launcher: L, pipeline: ExportPipeline, drivers: Vec<DriverId>) -> Self {
        let manager = Arc::new(WorkerProcessManager::new(launcher));
        Self {
            directory: DeviceDirectory::with_drivers(Arc::clone(&manager), drivers),
            session: ScanSession::new(Arc::clone(&manager)),
            manager,
            pipeline,
        }
    }

    /// Start the worker ahead of the first request.
    pub async fn ensure_backend_ready(&self) -> Result<()> {
        self.manager.ensure_backend_ready().await
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.directory.list_devices().await
    }

    /// Scan and keep the first page as one image.
    pub async fn scan_image(&self, options: ScanOptions) -> Result<ExportArtifact> {
        let pages = self.acquire_pages(options).await?;
        self.export(move |pipeline, stem| pipeline.export_single_image(pages, &stem))
            .await
    }

    /// Scan and return one image per page.
    pub async fn scan_images(&self, options: ScanOptions) -> Result<Vec<ExportArtifact>> {
        let pages = self.acquire_pages(options).await?;
        self.export(move |pipeline, stem| pipeline.export_each_image(pages, &stem))
            .await
    }

    /// Scan and return every page in one PDF.
    pub async fn scan_images_as_document(&self, options: ScanOptions) -> Result<ExportArtifact> {
        let pages = self.acquire_pages(options).await?;
        self.export(move |pipeline, stem| pipeline.export_as_document(pages, &stem))
            .await
    }

    async fn acquire_pages(&self, options: ScanOptions) -> Result<Vec<PageImage>> {
        let pages = self.session.run(options).await?;
        if pages.is_empty() {
            info!("Scan produced no pages");
            return Err(ScanOrchestrationError::no_images_produced().into());
        }
        Ok(pages)
    }

    async fn export<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ExportPipeline, String) -> Result<T> + Send + 'static,
    {
        let pipeline = self.pipeline.clone();
        let stem = artifact_stem();
        tokio::task::spawn_blocking(move || job(&pipeline, stem))
            .await
            .map_err(|e| {
                error!(error = %e, "Export task failed");
                Error::Unhandled(format!("Export task failed: {}", e))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeviceRef, PaperSource};
    use crate::error::{BackendError, ErrorCode};
    use crate::testing::{MockBackend, MockLauncher};

    fn service(backend: MockBackend, root: &std::path::Path) -> ScanService<MockLauncher> {
        ScanService::with_drivers(
            MockLauncher::new(backend),
            ExportPipeline::default().with_staging_root(root),
            vec![DriverId::Sane, DriverId::Escl],
        )
    }

    fn options() -> ScanOptions {
        ScanOptions::new(
            Some(DeviceRef::new(DriverId::Sane, "test:0")),
            300,
            PaperSource::Feeder,
        )
    }

    #[test]
    fn test_artifact_stem_shape() {
        let stem = artifact_stem();
        assert!(stem.starts_with("scan-"));
        assert_eq!(stem.len(), "scan-20240101-120000".len());
        assert_eq!(&stem[13..14], "-");
    }

    #[tokio::test]
    async fn test_scan_images_returns_one_artifact_per_page() {
        let root = tempfile::tempdir().unwrap();
        let service = service(MockBackend::new().with_pages(&[10, 20, 30]), root.path());

        let artifacts = service.scan_images(options()).await.unwrap();
        assert_eq!(artifacts.len(), 3);
        assert!(artifacts[0].suggested_file_name.ends_with("_1.png"));
        assert!(artifacts[2].suggested_file_name.ends_with("_3.png"));
    }

    #[tokio::test]
    async fn test_scan_image_and_document() {
        let root = tempfile::tempdir().unwrap();
        let service = service(MockBackend::new().with_pages(&[10, 20]), root.path());

        let single = service.scan_image(options()).await.unwrap();
        assert!(single.suggested_file_name.ends_with(".png"));
        assert!(!single.suggested_file_name.contains('_'));

        let document = service.scan_images_as_document(options()).await.unwrap();
        assert_eq!(document.mime_type, "application/pdf");
        assert!(document.suggested_file_name.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_zero_pages_is_no_images_produced() {
        let root = tempfile::tempdir().unwrap();
        let service = service(MockBackend::new(), root.path());

        let err = service.scan_images_as_document(options()).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NoImagesProduced));
    }

    #[tokio::test]
    async fn test_classified_errors_pass_through_unchanged() {
        let root = tempfile::tempdir().unwrap();
        let service = service(
            MockBackend::new().with_scan_error(BackendError::Driver("paper is offline".to_string())),
            root.path(),
        );

        let err = service.scan_image(options()).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DeviceOffline));
        assert_eq!(err.to_string(), "paper is offline");
    }

    #[tokio::test]
    async fn test_list_devices_and_prestart() {
        let root = tempfile::tempdir().unwrap();
        let backend = MockBackend::new()
            .with_devices(DriverId::Sane, &["a"])
            .with_devices(DriverId::Escl, &["b"]);
        let service = service(backend, root.path());

        service.ensure_backend_ready().await.unwrap();
        assert_eq!(service.list_devices().await.unwrap().len(), 2);
    }
}
