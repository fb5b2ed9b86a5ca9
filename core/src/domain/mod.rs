//! Domain layer - Pure data models of the scanning domain.
//!
//! These types have no I/O dependencies and can be tested in isolation.

mod device;
mod driver;
mod export;
mod scan;

pub use device::{Device, DeviceRef};
pub use driver::{driver_registry, DriverId};
pub use export::{ExportArtifact, ImageExportFormat};
pub use scan::{PageImage, PageSize, PaperSource, ScanOptions, ScanRequest};
