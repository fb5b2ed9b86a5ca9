//! Driver host port (interface), used on the worker side.

use std::future::Future;

use crate::domain::{Device, DriverId, ScanRequest};
use crate::error::BackendResult;

/// Port for the set of drivers a worker process can talk to.
///
/// This is what actually touches hardware; it runs inside the worker.
pub trait DriverHost: Send + Sync + 'static {
    /// Enumerate devices through one driver.
    fn list_devices(
        &self,
        driver: DriverId,
    ) -> impl Future<Output = BackendResult<Vec<Device>>> + Send;

    /// Run one scan to completion and return the encoded (PNG) pages in acquisition order.
    ///
    /// An empty result is a valid outcome (e.g. an empty feeder).
    fn scan(
        &self,
        request: &ScanRequest,
    ) -> impl Future<Output = BackendResult<Vec<Vec<u8>>>> + Send;
}
