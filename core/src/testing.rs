//! Test doubles shared by the unit tests of this crate.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;

use crate::domain::{Device, DriverId, PageImage, ScanRequest};
use crate::error::{BackendError, BackendResult};
use crate::ports::{PageStream, ScanBackend, WorkerLauncher};

/// A solid-colour page `width` pixels wide.
pub(crate) fn page(index: u32, width: u32) -> PageImage {
    let shade = (index * 40 % 255) as u8;
    let image = RgbImage::from_pixel(width, 8, Rgb([shade, 255 - shade, 128]));
    PageImage::new(index, 100, DynamicImage::ImageRgb8(image))
}

/// PNG encoding of a `width` x `height` image.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

type DriverScript = (Duration, BackendResult<Vec<Device>>);

struct MockState {
    drivers: Mutex<HashMap<DriverId, DriverScript>>,
    scan: Mutex<BackendResult<Vec<BackendResult<PageImage>>>>,
    scan_delay: Mutex<Duration>,
    list_calls: AtomicUsize,
    scan_calls: AtomicUsize,
    alive: AtomicBool,
}

/// Scripted backend. Clones share state, so a test can keep one to inspect calls.
#[derive(Clone)]
pub(crate) struct MockBackend {
    inner: Arc<MockState>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(MockState {
                drivers: Mutex::new(HashMap::new()),
                scan: Mutex::new(Ok(Vec::new())),
                scan_delay: Mutex::new(Duration::ZERO),
                list_calls: AtomicUsize::new(0),
                scan_calls: AtomicUsize::new(0),
                alive: AtomicBool::new(true),
            }),
        }
    }

    pub(crate) fn with_devices(self, driver: DriverId, ids: &[&str]) -> Self {
        let devices = ids
            .iter()
            .map(|id| Device::new(driver, *id, format!("{} scanner {}", driver, id)))
            .collect();
        self.script_driver(driver, Duration::ZERO, Ok(devices))
    }

    pub(crate) fn with_driver_error(self, driver: DriverId, error: BackendError) -> Self {
        self.script_driver(driver, Duration::ZERO, Err(error))
    }

    pub(crate) fn with_driver_delay(self, driver: DriverId, delay: Duration) -> Self {
        if let Some(script) = self.inner.drivers.lock().get_mut(&driver) {
            script.0 = delay;
        }
        self
    }

    /// Scans succeed with one page per width, in order.
    pub(crate) fn with_pages(self, widths: &[u32]) -> Self {
        let pages = widths
            .iter()
            .enumerate()
            .map(|(i, w)| Ok(page(i as u32 + 1, *w)))
            .collect();
        *self.inner.scan.lock() = Ok(pages);
        self
    }

    /// Scans fail at dispatch.
    pub(crate) fn with_scan_error(self, error: BackendError) -> Self {
        *self.inner.scan.lock() = Err(error);
        self
    }

    /// Scans stream exactly these items.
    pub(crate) fn with_stream(self, items: Vec<BackendResult<PageImage>>) -> Self {
        *self.inner.scan.lock() = Ok(items);
        self
    }

    pub(crate) fn with_scan_delay(self, delay: Duration) -> Self {
        *self.inner.scan_delay.lock() = delay;
        self
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn scan_calls(&self) -> usize {
        self.inner.scan_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.inner.alive.store(alive, Ordering::SeqCst);
    }

    fn script_driver(
        self,
        driver: DriverId,
        delay: Duration,
        result: BackendResult<Vec<Device>>,
    ) -> Self {
        self.inner.drivers.lock().insert(driver, (delay, result));
        self
    }
}

impl ScanBackend for MockBackend {
    async fn list_devices(&self, driver: DriverId) -> BackendResult<Vec<Device>> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = self
            .inner
            .drivers
            .lock()
            .get(&driver)
            .cloned()
            .unwrap_or((Duration::ZERO, Ok(Vec::new())));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn scan(&self, _request: &ScanRequest) -> BackendResult<PageStream> {
        self.inner.scan_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inner.scan_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let script = self.inner.scan.lock().clone();
        script.map(PageStream::from_results)
    }

    fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }
}

/// Launcher that hands out a [`MockBackend`] and counts launches.
pub(crate) struct MockLauncher {
    backend: MockBackend,
    failure: Option<BackendError>,
    delay: Duration,
    launches: Arc<AtomicUsize>,
}

impl MockLauncher {
    pub(crate) fn new(backend: MockBackend) -> Self {
        Self {
            backend,
            failure: None,
            delay: Duration::ZERO,
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing(error: BackendError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(MockBackend::new())
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared launch counter, readable after the launcher is moved.
    pub(crate) fn launches(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.launches)
    }
}

impl WorkerLauncher for MockLauncher {
    type Backend = MockBackend;

    async fn launch(&self) -> BackendResult<MockBackend> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.backend.clone()),
        }
    }
}
