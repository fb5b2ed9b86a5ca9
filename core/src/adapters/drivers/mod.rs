//! Driver adapters, run inside the worker process.
//!
//! SANE and eSCL are served by the `scanimage` frontend; eSCL devices are the
//! network subset of what SANE reports (through the `airscan`/`escl` backends),
//! so a network scanner legitimately shows up under both drivers.

mod scanimage;

pub use scanimage::{parse_device_list, scan_args, DeviceFilter, Scanimage};

use tracing::debug;

use crate::domain::{Device, DriverId, ScanRequest};
use crate::error::{BackendError, BackendResult};
use crate::ports::DriverHost;

/// The drivers available to this worker.
#[derive(Debug, Clone, Default)]
pub struct DriverSet {
    scanimage: Option<Scanimage>,
}

impl DriverSet {
    /// Discover the drivers installed on this host.
    pub fn new() -> Self {
        let scanimage = Scanimage::discover();
        match &scanimage {
            Some(s) => debug!(path = %s.path().display(), "Found scanimage"),
            None => debug!("scanimage not found, SANE and eSCL drivers disabled"),
        }
        Self { scanimage }
    }

    /// Use a specific scanimage executable.
    pub fn with_scanimage(scanimage: Scanimage) -> Self {
        Self {
            scanimage: Some(scanimage),
        }
    }

    fn scanimage_for(&self, driver: DriverId) -> BackendResult<&Scanimage> {
        match driver {
            DriverId::Sane | DriverId::Escl => self
                .scanimage
                .as_ref()
                .ok_or(BackendError::Unsupported(driver)),
            // TODO: WIA and TWAIN need native Windows bindings; ImageCaptureCore needs an
            // Objective-C bridge. Until then these drivers report as unsupported.
            DriverId::Wia | DriverId::Twain | DriverId::Apple => {
                Err(BackendError::Unsupported(driver))
            }
        }
    }
}

impl DriverHost for DriverSet {
    async fn list_devices(&self, driver: DriverId) -> BackendResult<Vec<Device>> {
        let scanimage = self.scanimage_for(driver)?;
        let filter = match driver {
            DriverId::Escl => DeviceFilter::Network,
            _ => DeviceFilter::All,
        };
        scanimage.list_devices(driver, filter).await
    }

    async fn scan(&self, request: &ScanRequest) -> BackendResult<Vec<Vec<u8>>> {
        self.scanimage_for(request.device.driver_id)?
            .scan(request)
            .await
    }
}
