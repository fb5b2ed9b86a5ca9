//! Device models.

use serde::{Deserialize, Serialize};

use super::DriverId;

/// One scanning unit reachable through a specific driver.
///
/// Recreated on every directory query; never cached beyond one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub driver_id: DriverId,
    /// Backend-unique identifier (e.g. a SANE device name).
    pub device_id: String,
    pub display_name: String,
}

impl Device {
    pub fn new(
        driver_id: DriverId,
        device_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            driver_id,
            device_id: device_id.into(),
            display_name: display_name.into(),
        }
    }

    /// The reference a caller uses to address this device in a scan.
    pub fn reference(&self) -> DeviceRef {
        DeviceRef {
            driver_id: self.driver_id,
            device_id: self.device_id.clone(),
        }
    }
}

/// Identifies a device for a scan: driver plus backend-unique id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    pub driver_id: DriverId,
    pub device_id: String,
}

impl DeviceRef {
    pub fn new(driver_id: DriverId, device_id: impl Into<String>) -> Self {
        Self {
            driver_id,
            device_id: device_id.into(),
        }
    }

    /// Key used for per-device locking.
    pub(crate) fn lock_key(&self) -> String {
        format!("{}:{}", self.driver_id, self.device_id)
    }
}

impl std::fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.device_id, self.driver_id)
    }
}
