//! Export artifact models.

use serde::{Deserialize, Serialize};

/// The encoded output of an export, returned to the caller and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub suggested_file_name: String,
}

impl ExportArtifact {
    pub fn new(bytes: Vec<u8>, mime_type: &'static str, suggested_file_name: String) -> Self {
        Self {
            bytes,
            mime_type,
            suggested_file_name,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Raster format used by the single-image and per-image export modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageExportFormat {
    #[default]
    Png,
    Jpeg,
    Tiff,
    Bmp,
}

impl ImageExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageExportFormat::Png => "png",
            ImageExportFormat::Jpeg => "jpg",
            ImageExportFormat::Tiff => "tiff",
            ImageExportFormat::Bmp => "bmp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageExportFormat::Png => "image/png",
            ImageExportFormat::Jpeg => "image/jpeg",
            ImageExportFormat::Tiff => "image/tiff",
            ImageExportFormat::Bmp => "image/bmp",
        }
    }

    pub(crate) fn as_image_format(&self) -> image::ImageFormat {
        match self {
            ImageExportFormat::Png => image::ImageFormat::Png,
            ImageExportFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageExportFormat::Tiff => image::ImageFormat::Tiff,
            ImageExportFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

impl std::str::FromStr for ImageExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageExportFormat::Png),
            "jpg" | "jpeg" => Ok(ImageExportFormat::Jpeg),
            "tif" | "tiff" => Ok(ImageExportFormat::Tiff),
            "bmp" => Ok(ImageExportFormat::Bmp),
            other => Err(format!("unsupported image format '{}'", other)),
        }
    }
}
