//! Encoding of scanned pages into caller-facing artifacts.
//!
//! Every export stages its output inside a private directory that is
//! removed before the call returns, whether the export succeeded or not.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tempfile::TempDir;
use tracing::debug;

use crate::domain::{ExportArtifact, ImageExportFormat, PageImage};
use crate::error::{Result, ScanOrchestrationError};

/// Default JPEG quality for exports and PDF pages.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

const PDF_MIME_TYPE: &str = "application/pdf";
const POINTS_PER_INCH: f32 = 72.0;

fn export_err(context: &str, e: impl std::fmt::Display) -> ScanOrchestrationError {
    ScanOrchestrationError::export_failed(format!("{}: {}", context, e))
}

/// Encodes page sequences. Synchronous and CPU-bound; async callers should
/// run it on the blocking pool.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    format: ImageExportFormat,
    jpeg_quality: u8,
    staging_root: Option<PathBuf>,
}

impl Default for ExportPipeline {
    fn default() -> Self {
        Self::new(ImageExportFormat::default())
    }
}

impl ExportPipeline {
    pub fn new(format: ImageExportFormat) -> Self {
        Self {
            format,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            staging_root: None,
        }
    }

    /// JPEG quality, clamped to 1..=100.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Stage under `root` instead of the system temp directory.
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    pub fn format(&self) -> ImageExportFormat {
        self.format
    }

    /// Encode the first page only. Later pages are dropped.
    pub fn export_single_image(&self, images: Vec<PageImage>, stem: &str) -> Result<ExportArtifact> {
        let first = images
            .into_iter()
            .next()
            .ok_or_else(ScanOrchestrationError::no_images_produced)?;

        let staging = self.staging_dir()?;
        let name = format!("{}.{}", stem, self.format.extension());
        let artifact = self.stage_image(&first, staging.path(), name);
        finish_staging(staging, artifact)
    }

    /// Encode every page as its own artifact, named `<stem>_<n>`.
    pub fn export_each_image(&self, images: Vec<PageImage>, stem: &str) -> Result<Vec<ExportArtifact>> {
        if images.is_empty() {
            return Err(ScanOrchestrationError::no_images_produced().into());
        }

        let staging = self.staging_dir()?;
        let artifacts: Result<Vec<_>> = images
            .iter()
            .enumerate()
            .map(|(i, page)| {
                let name = format!("{}_{}.{}", stem, i + 1, self.format.extension());
                self.stage_image(page, staging.path(), name)
            })
            .collect();
        finish_staging(staging, artifacts)
    }

    /// Encode all pages into one PDF, one page per image, in order.
    pub fn export_as_document(&self, images: Vec<PageImage>, stem: &str) -> Result<ExportArtifact> {
        if images.is_empty() {
            return Err(ScanOrchestrationError::no_images_produced().into());
        }

        let staging = self.staging_dir()?;
        let artifact = self.stage_document(&images, staging.path(), stem);
        finish_staging(staging, artifact)
    }

    fn staging_dir(&self) -> Result<TempDir> {
        let root = self
            .staging_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let dir = tempfile::Builder::new()
            .prefix("scannerfy-export-")
            .tempdir_in(&root)
            .map_err(|e| export_err("Failed to create staging directory", e))?;
        Ok(dir)
    }

    fn stage_document(&self, images: &[PageImage], dir: &Path, stem: &str) -> Result<ExportArtifact> {
        let mut doc = self.build_document(images)?;

        let name = format!("{}.pdf", stem);
        let path = dir.join(&name);
        doc.save(&path)
            .map_err(|e| export_err("Failed to write PDF", e))?;
        let bytes = std::fs::read(&path).map_err(|e| export_err("Failed to read PDF", e))?;

        debug!(pages = images.len(), bytes = bytes.len(), "Exported document");
        Ok(ExportArtifact::new(bytes, PDF_MIME_TYPE, name))
    }

    fn stage_image(&self, page: &PageImage, dir: &Path, name: String) -> Result<ExportArtifact> {
        let path = dir.join(&name);
        let file = File::create(&path).map_err(|e| export_err("Failed to stage image", e))?;
        let mut writer = BufWriter::new(file);

        match self.format {
            ImageExportFormat::Jpeg => JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality)
                .encode_image(&page.image.to_rgb8()),
            other => page.image.write_to(&mut writer, other.as_image_format()),
        }
        .map_err(|e| export_err("Failed to encode image", e))?;
        writer
            .flush()
            .map_err(|e| export_err("Failed to stage image", e))?;
        drop(writer);

        let bytes = std::fs::read(&path).map_err(|e| export_err("Failed to read staged image", e))?;
        debug!(page = page.index, file = %name, bytes = bytes.len(), "Exported image");
        Ok(ExportArtifact::new(bytes, self.format.mime_type(), name))
    }

    fn build_document(&self, images: &[PageImage]) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::with_capacity(images.len());
        for page in images {
            let page_id = self.add_page(&mut doc, pages_id, page)?;
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Ok(doc)
    }

    fn add_page(&self, doc: &mut Document, pages_id: ObjectId, page: &PageImage) -> Result<ObjectId> {
        let rgb = page.image.to_rgb8();
        let (width_px, height_px) = rgb.dimensions();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality)
            .encode_image(&rgb)
            .map_err(|e| export_err("Failed to encode PDF page", e))?;

        let image_id = doc.add_object(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width_px as i64,
                    "Height" => height_px as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8_i64,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            )
            .with_compression(false),
        );

        let (width_pt, height_pt) = page_size_points(width_px, height_px, page.dpi);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(width_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(height_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| export_err("Failed to encode PDF content", e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

        Ok(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width_pt),
                Object::Real(height_pt),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        }))
    }
}

/// Remove the staging directory before handing back a successful result.
///
/// A failed removal fails the export. On the error path the directory is
/// dropped instead, which still removes it but cannot report a problem.
fn finish_staging<T>(staging: TempDir, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            staging
                .close()
                .map_err(|e| export_err("Failed to remove staging directory", e))?;
            Ok(value)
        }
        Err(e) => Err(e),
    }
}

/// Physical page size in PDF points for a raster scanned at `dpi`.
fn page_size_points(width_px: u32, height_px: u32, dpi: u32) -> (f32, f32) {
    let dpi = dpi.max(1) as f32;
    (
        width_px as f32 * POINTS_PER_INCH / dpi,
        height_px as f32 * POINTS_PER_INCH / dpi,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::page;

    fn pages(widths: &[u32]) -> Vec<PageImage> {
        widths
            .iter()
            .enumerate()
            .map(|(i, w)| page(i as u32 + 1, *w))
            .collect()
    }

    fn staging_is_empty(root: &Path) -> bool {
        std::fs::read_dir(root).unwrap().next().is_none()
    }

    fn pdf_page_widths(bytes: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|page_id| {
                let page = doc.get_dictionary(*page_id).unwrap();
                let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
                let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
                let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
                let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
                image.dict.get(b"Width").unwrap().as_i64().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_each_image_names_use_one_based_suffixes() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::default().with_staging_root(root.path());

        let artifacts = pipeline.export_each_image(pages(&[10, 20, 30]), "scan").unwrap();
        let names: Vec<_> = artifacts
            .iter()
            .map(|a| a.suggested_file_name.as_str())
            .collect();
        assert_eq!(names, vec!["scan_1.png", "scan_2.png", "scan_3.png"]);

        let widths: Vec<_> = artifacts
            .iter()
            .map(|a| image::load_from_memory(&a.bytes).unwrap().width())
            .collect();
        assert_eq!(widths, vec![10, 20, 30]);
        assert!(artifacts.iter().all(|a| a.mime_type == "image/png"));
        assert!(staging_is_empty(root.path()));
    }

    #[test]
    fn test_single_image_keeps_only_the_first_page() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::new(ImageExportFormat::Jpeg).with_staging_root(root.path());

        let artifact = pipeline.export_single_image(pages(&[12, 24]), "scan").unwrap();
        assert_eq!(artifact.suggested_file_name, "scan.jpg");
        assert_eq!(artifact.mime_type, "image/jpeg");
        let decoded = image::load_from_memory(&artifact.bytes).unwrap();
        assert_eq!(decoded.width(), 12);
        assert!(staging_is_empty(root.path()));
    }

    #[test]
    fn test_document_has_one_page_per_image_in_order() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::default().with_staging_root(root.path());

        let artifact = pipeline
            .export_as_document(pages(&[10, 20, 30]), "scan")
            .unwrap();
        assert_eq!(artifact.suggested_file_name, "scan.pdf");
        assert_eq!(artifact.mime_type, "application/pdf");
        assert!(artifact.bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(pdf_page_widths(&artifact.bytes), vec![10, 20, 30]);
        assert!(staging_is_empty(root.path()));
    }

    #[test]
    fn test_empty_input_is_no_images_produced() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::default().with_staging_root(root.path());

        let codes = [
            pipeline.export_single_image(vec![], "scan").unwrap_err().code(),
            pipeline.export_each_image(vec![], "scan").unwrap_err().code(),
            pipeline.export_as_document(vec![], "scan").unwrap_err().code(),
        ];
        assert!(codes.iter().all(|c| *c == Some(ErrorCode::NoImagesProduced)));
        assert!(staging_is_empty(root.path()));
    }

    #[test]
    fn test_staging_is_removed_on_failure() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::default().with_staging_root(root.path());

        // The staged file's parent does not exist, so writing it fails.
        let err = pipeline
            .export_as_document(pages(&[10, 20]), "missing/doc")
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ExportFailed));

        let err = pipeline
            .export_each_image(pages(&[10]), "missing/img")
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ExportFailed));

        assert!(staging_is_empty(root.path()));
    }

    #[test]
    fn test_missing_staging_root_is_export_failed() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::default().with_staging_root(root.path().join("gone"));

        let err = pipeline.export_single_image(pages(&[10]), "scan").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ExportFailed));
    }

    #[test]
    fn test_failed_staging_removal_fails_the_export() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::default().with_staging_root(root.path());

        let staging = pipeline.staging_dir().unwrap();
        std::fs::remove_dir_all(staging.path()).unwrap();

        let err = finish_staging(staging, Ok(())).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ExportFailed));
        assert!(err.to_string().contains("Failed to remove staging directory"));
    }

    #[test]
    fn test_staging_is_closed_before_success_returns() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = ExportPipeline::default().with_staging_root(root.path());

        let staging = pipeline.staging_dir().unwrap();
        std::fs::write(staging.path().join("scan.png"), b"staged").unwrap();
        assert!(!staging_is_empty(root.path()));

        assert_eq!(finish_staging(staging, Ok(7)).unwrap(), 7);
        assert!(staging_is_empty(root.path()));
    }

    #[test]
    fn test_page_box_follows_dpi() {
        assert_eq!(page_size_points(300, 600, 300), (72.0, 144.0));
        assert_eq!(page_size_points(100, 100, 0), (7200.0, 7200.0));
    }

    #[test]
    fn test_jpeg_quality_is_clamped() {
        let pipeline = ExportPipeline::default().with_jpeg_quality(0);
        assert_eq!(pipeline.jpeg_quality, 1);
        let pipeline = ExportPipeline::default().with_jpeg_quality(200);
        assert_eq!(pipeline.jpeg_quality, 100);
    }
}
