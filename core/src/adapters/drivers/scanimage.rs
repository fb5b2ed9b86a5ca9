//! SANE driver access through the `scanimage` command-line frontend.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::{Device, DriverId, PaperSource, ScanRequest};
use crate::error::{BackendError, BackendResult};

/// Default paths to search for scanimage.
const SCANIMAGE_PATHS: &[&str] = &[
    "/usr/bin/scanimage",
    "/usr/local/bin/scanimage",
    "/opt/homebrew/bin/scanimage", // Apple Silicon
    "/opt/local/bin/scanimage",    // MacPorts
];

/// SANE name prefixes of network (eSCL / AirScan) devices.
const NETWORK_PREFIXES: &[&str] = &["airscan:", "escl:"];

/// Which devices a listing keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFilter {
    All,
    Network,
}

impl DeviceFilter {
    fn keeps(&self, sane_name: &str) -> bool {
        match self {
            DeviceFilter::All => true,
            DeviceFilter::Network => NETWORK_PREFIXES.iter().any(|p| sane_name.starts_with(p)),
        }
    }
}

/// Wrapper around one `scanimage` executable.
#[derive(Debug, Clone)]
pub struct Scanimage {
    path: PathBuf,
}

impl Scanimage {
    /// Look for scanimage in the usual install locations.
    pub fn discover() -> Option<Self> {
        SCANIMAGE_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .map(|path| Self { path })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List devices, reported under `driver`.
    pub async fn list_devices(
        &self,
        driver: DriverId,
        filter: DeviceFilter,
    ) -> BackendResult<Vec<Device>> {
        let output = Command::new(&self.path)
            .arg("--list-devices")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BackendError::Driver(format!("Failed to run scanimage: {}", e)))?;

        if !output.status.success() {
            return Err(BackendError::Driver(last_line(&output.stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_device_list(driver, filter, &stdout))
    }

    /// Scan into a private batch directory and return the PNG pages in order.
    pub async fn scan(&self, request: &ScanRequest) -> BackendResult<Vec<Vec<u8>>> {
        let batch_dir = tempfile::Builder::new()
            .prefix("scannerfy-batch-")
            .tempdir()
            .map_err(|e| BackendError::Driver(format!("Failed to create batch directory: {}", e)))?;

        let args = scan_args(request, batch_dir.path());
        debug!(?args, "Running scanimage");

        let output = Command::new(&self.path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BackendError::Driver(format!("Failed to run scanimage: {}", e)))?;

        let pages = read_batch(batch_dir.path()).await?;

        if output.status.success() {
            return Ok(pages);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("out of documents") {
            // Normal end of a feeder batch; zero pages means the feeder was empty.
            return Ok(pages);
        }

        warn!(status = ?output.status.code(), "scanimage failed");
        Err(BackendError::Driver(last_line(&output.stderr)))
    }
}

fn device_line_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^device `(.+?)' is an? (.+)$").unwrap())
}

/// Parse `scanimage --list-devices` output, keeping scanimage's order.
pub fn parse_device_list(driver: DriverId, filter: DeviceFilter, output: &str) -> Vec<Device> {
    output
        .lines()
        .filter_map(|line| device_line_regex().captures(line.trim()))
        .filter(|caps| filter.keeps(&caps[1]))
        .map(|caps| Device::new(driver, &caps[1], caps[2].trim()))
        .collect()
}

/// Build the scanimage arguments for one batch scan.
pub fn scan_args(request: &ScanRequest, batch_dir: &Path) -> Vec<String> {
    let (width_mm, height_mm) = request.page_size.dimensions_mm();
    let source = match request.paper_source {
        PaperSource::Flatbed => "Flatbed",
        PaperSource::Feeder => "ADF",
        PaperSource::Duplex => "ADF Duplex",
    };

    let mut args = vec![
        format!("--device-name={}", request.device.device_id),
        "--format=png".to_string(),
        format!("--resolution={}", request.dpi),
        format!("--source={}", source),
        "-l".to_string(),
        "0".to_string(),
        "-t".to_string(),
        "0".to_string(),
        "-x".to_string(),
        format!("{}", width_mm),
        "-y".to_string(),
        format!("{}", height_mm),
        format!("--batch={}", batch_dir.join("page-%04d.png").display()),
    ];

    if !request.paper_source.is_feeder() {
        args.push("--batch-count=1".to_string());
    }

    args
}

async fn read_batch(dir: &Path) -> BackendResult<Vec<Vec<u8>>> {
    let read_err = |e: std::io::Error| BackendError::Driver(format!("Failed to read scanned pages: {}", e));

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("page-") && name.ends_with(".png") {
            names.push(name);
        }
    }
    // Zero-padded counters sort in acquisition order.
    names.sort();

    let mut pages = Vec::with_capacity(names.len());
    for name in names {
        pages.push(tokio::fs::read(dir.join(name)).await.map_err(read_err)?);
    }
    Ok(pages)
}

fn last_line(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.trim_start_matches("scanimage:").trim().to_string())
        .unwrap_or_else(|| "scanimage failed without diagnostics".to_string())
}
