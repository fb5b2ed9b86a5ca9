//! Device discovery across all registered drivers.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::WorkerProcessManager;
use crate::domain::{driver_registry, Device, DriverId};
use crate::error::{BackendError, Result, ScanOrchestrationError};
use crate::ports::{ScanBackend, WorkerLauncher};

/// Merges the device lists of every registered driver into one list.
///
/// No de-duplication happens here: a device reachable through two drivers
/// (e.g. a network scanner seen by both SANE and eSCL) is listed once per
/// driver, because each entry is a distinct way to reach it.
pub struct DeviceDirectory<L: WorkerLauncher> {
    manager: Arc<WorkerProcessManager<L>>,
    drivers: Vec<DriverId>,
}

impl<L: WorkerLauncher> DeviceDirectory<L> {
    /// Directory over the platform driver registry.
    pub fn new(manager: Arc<WorkerProcessManager<L>>) -> Self {
        Self::with_drivers(manager, driver_registry().to_vec())
    }

    /// Directory over an explicit, ordered driver list.
    pub fn with_drivers(manager: Arc<WorkerProcessManager<L>>, drivers: Vec<DriverId>) -> Self {
        Self { manager, drivers }
    }

    pub fn drivers(&self) -> &[DriverId] {
        &self.drivers
    }

    /// Query every driver concurrently and flatten the results.
    ///
    /// Order is registry order, then the order each driver reported. A
    /// driver that fails is skipped; the call only fails when the backend
    /// itself is unavailable.
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let backend = self.manager.acquire().await?;

        let results = join_all(
            self.drivers
                .iter()
                .map(|driver| backend.list_devices(*driver)),
        )
        .await;

        let mut devices = Vec::new();
        let mut unavailable = Vec::new();
        for (driver, result) in self.drivers.iter().zip(results) {
            match result {
                Ok(found) => {
                    debug!(driver = %driver, count = found.len(), "Driver enumerated devices");
                    devices.extend(found);
                }
                Err(BackendError::Unavailable(reason)) => {
                    warn!(driver = %driver, %reason, "Backend unavailable during enumeration");
                    unavailable.push(reason);
                }
                Err(e) => {
                    warn!(driver = %driver, error = %e, "Driver failed to enumerate devices");
                }
            }
        }

        if !self.drivers.is_empty() && unavailable.len() == self.drivers.len() {
            return Err(ScanOrchestrationError::backend_unavailable(unavailable.join("; ")).into());
        }

        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::{MockBackend, MockLauncher};
    use std::time::Duration;

    fn directory(backend: MockBackend, drivers: Vec<DriverId>) -> DeviceDirectory<MockLauncher> {
        let manager = Arc::new(WorkerProcessManager::new(MockLauncher::new(backend)));
        DeviceDirectory::with_drivers(manager, drivers)
    }

    #[tokio::test]
    async fn test_flattens_in_registry_then_backend_order() {
        let backend = MockBackend::new()
            .with_devices(DriverId::Sane, &["s1", "s2"])
            .with_devices(DriverId::Escl, &["e1"]);
        let dir = directory(backend, vec![DriverId::Escl, DriverId::Sane]);

        let ids: Vec<_> = dir
            .list_devices()
            .await
            .unwrap()
            .into_iter()
            .map(|d| (d.driver_id, d.device_id))
            .collect();
        assert_eq!(
            ids,
            vec![
                (DriverId::Escl, "e1".to_string()),
                (DriverId::Sane, "s1".to_string()),
                (DriverId::Sane, "s2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_same_device_under_two_drivers_is_listed_twice() {
        let backend = MockBackend::new()
            .with_devices(DriverId::Sane, &["airscan:e0:Office"])
            .with_devices(DriverId::Escl, &["airscan:e0:Office"]);
        let dir = directory(backend, vec![DriverId::Sane, DriverId::Escl]);

        assert_eq!(dir.list_devices().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_drivers() {
        let backend = MockBackend::new()
            .with_devices(DriverId::Sane, &["s1", "s2"])
            .with_driver_error(DriverId::Twain, BackendError::Unsupported(DriverId::Twain))
            .with_devices(DriverId::Escl, &["e1"]);
        let dir = directory(backend.clone(), vec![DriverId::Sane, DriverId::Twain, DriverId::Escl]);

        let devices = dir.list_devices().await.unwrap();
        assert_eq!(devices.len(), 3);
        assert_eq!(backend.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_every_driver_failing_with_driver_errors_is_empty() {
        let backend = MockBackend::new()
            .with_driver_error(DriverId::Sane, BackendError::Driver("io error".to_string()))
            .with_driver_error(DriverId::Escl, BackendError::Unsupported(DriverId::Escl));
        let dir = directory(backend, vec![DriverId::Sane, DriverId::Escl]);

        assert!(dir.list_devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_down_is_backend_unavailable() {
        let gone = || BackendError::Unavailable("worker exited".to_string());
        let backend = MockBackend::new()
            .with_driver_error(DriverId::Sane, gone())
            .with_driver_error(DriverId::Escl, gone());
        let dir = directory(backend, vec![DriverId::Sane, DriverId::Escl]);

        let err = dir.list_devices().await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BackendUnavailable));
    }

    #[tokio::test]
    async fn test_launch_failure_is_backend_unavailable() {
        let manager = Arc::new(WorkerProcessManager::new(MockLauncher::failing(
            BackendError::Unavailable("cannot spawn".to_string()),
        )));
        let dir = DeviceDirectory::with_drivers(manager, vec![DriverId::Sane]);

        let err = dir.list_devices().await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BackendUnavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drivers_are_queried_in_parallel() {
        let backend = MockBackend::new()
            .with_devices(DriverId::Sane, &["s1"])
            .with_driver_delay(DriverId::Sane, Duration::from_secs(3))
            .with_devices(DriverId::Escl, &["e1"])
            .with_driver_delay(DriverId::Escl, Duration::from_secs(5))
            .with_devices(DriverId::Twain, &["t1"])
            .with_driver_delay(DriverId::Twain, Duration::from_secs(4));
        let dir = directory(backend, vec![DriverId::Sane, DriverId::Escl, DriverId::Twain]);

        let started = tokio::time::Instant::now();
        let devices = dir.list_devices().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(devices.len(), 3);
        // Slowest driver (5s), not the sum (12s).
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_default_uses_platform_registry() {
        let manager = Arc::new(WorkerProcessManager::new(MockLauncher::new(MockBackend::new())));
        let dir = DeviceDirectory::new(manager);
        assert_eq!(dir.drivers(), driver_registry());
    }
}
