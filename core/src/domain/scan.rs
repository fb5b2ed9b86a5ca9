//! Scan request and page models.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::DeviceRef;
use crate::error::ScanOrchestrationError;

// ============================================================================
// PaperSource / PageSize
// ============================================================================

/// Where the device pulls paper from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PaperSource {
    #[default]
    Flatbed,
    Feeder,
    Duplex,
}

impl PaperSource {
    /// Whether the source can produce more than one page per scan.
    pub fn is_feeder(&self) -> bool {
        matches!(self, PaperSource::Feeder | PaperSource::Duplex)
    }
}

/// Scan area. Chosen by policy, not by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in millimetres.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
        }
    }
}

// ============================================================================
// ScanOptions / ScanRequest
// ============================================================================

/// Unvalidated scan parameters as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    pub device: Option<DeviceRef>,
    pub dpi: i64,
    #[serde(default)]
    pub paper_source: PaperSource,
}

impl ScanOptions {
    pub fn new(device: Option<DeviceRef>, dpi: i64, paper_source: PaperSource) -> Self {
        Self {
            device,
            dpi,
            paper_source,
        }
    }
}

/// A validated scan job, ready for dispatch to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub device: DeviceRef,
    pub dpi: u32,
    pub paper_source: PaperSource,
    pub page_size: PageSize,
}

impl ScanRequest {
    /// Validate caller options. Fails before anything touches the backend.
    pub fn validate(options: ScanOptions) -> Result<Self, ScanOrchestrationError> {
        let device = options
            .device
            .ok_or_else(|| ScanOrchestrationError::invalid_request("A device must be specified"))?;

        if device.device_id.trim().is_empty() {
            return Err(ScanOrchestrationError::invalid_request(
                "A device must be specified",
            ));
        }

        if options.dpi <= 0 {
            return Err(ScanOrchestrationError::invalid_request(format!(
                "DPI must be a positive integer, got {}",
                options.dpi
            )));
        }

        let dpi = u32::try_from(options.dpi).map_err(|_| {
            ScanOrchestrationError::invalid_request(format!("DPI {} is out of range", options.dpi))
        })?;

        Ok(Self {
            device,
            dpi,
            paper_source: options.paper_source,
            page_size: PageSize::default(),
        })
    }
}

// ============================================================================
// PageImage
// ============================================================================

/// One decoded raster page, numbered by acquisition order starting at 1.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub index: u32,
    pub dpi: u32,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(index: u32, dpi: u32, image: DynamicImage) -> Self {
        Self { index, dpi, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
