//! Configuration management for the scanning service.
//!
//! Stores configuration in JSON format at `~/.scannerfy/config.json`.
//! A missing file means defaults; only `serve` insists on an `appUrl`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::adapters::ProcessWorkerLauncher;
use crate::application::{ExportPipeline, DEFAULT_JPEG_QUALITY};
use crate::domain::ImageExportFormat;
use crate::error::{Error, Result};

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Public URL of the HTTP API, e.g. `http://localhost:5000`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

/// How the scan worker is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Worker executable. Defaults to this binary in worker mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Arguments for a custom `executable`.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Start the worker when the server starts instead of on first use.
    #[serde(default)]
    pub prestart: bool,
}

fn default_startup_timeout_secs() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            executable: None,
            args: Vec::new(),
            startup_timeout_secs: default_startup_timeout_secs(),
            prestart: false,
        }
    }
}

impl WorkerConfig {
    /// Build the launcher described by this config.
    pub fn launcher(&self) -> Result<ProcessWorkerLauncher> {
        let launcher = match &self.executable {
            Some(program) => ProcessWorkerLauncher::new(program, self.args.clone()),
            None => ProcessWorkerLauncher::current_exe()?,
        };
        Ok(launcher.with_startup_timeout(Duration::from_secs(self.startup_timeout_secs)))
    }
}

/// Output encoding settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    #[serde(default)]
    pub image_format: ImageExportFormat,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Root for per-export staging directories. Defaults to the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            image_format: ImageExportFormat::default(),
            jpeg_quality: default_jpeg_quality(),
            staging_dir: None,
        }
    }
}

impl ExportConfig {
    pub fn pipeline(&self) -> ExportPipeline {
        let pipeline = ExportPipeline::new(self.image_format).with_jpeg_quality(self.jpeg_quality);
        match &self.staging_dir {
            Some(dir) => pipeline.with_staging_root(dir),
            None => pipeline,
        }
    }
}

impl Config {
    /// The configured app URL, or an error naming how to provide one.
    pub fn require_app_url(&self) -> Result<&str> {
        self.app_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::Config(
                    "appUrl is not configured (set it in the config file, \
                     pass --app-url, or set SCANNERFY_APP_URL)"
                        .to_string(),
                )
            })
    }

    /// `host:port` to bind, taken from the app URL.
    pub fn bind_address(&self) -> Result<String> {
        let authority = url_authority(self.require_app_url()?);
        port_of(authority)?;
        Ok(authority.to_string())
    }

    /// Port of the app URL.
    pub fn port(&self) -> Result<u16> {
        port_of(url_authority(self.require_app_url()?))
    }
}

/// `http://host:5000/path` -> `host:5000`.
fn url_authority(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().unwrap_or(rest)
}

fn port_of(authority: &str) -> Result<u16> {
    let (_, port) = authority
        .rsplit_once(':')
        .ok_or_else(|| Error::Config(format!("appUrl '{}' has no port", authority)))?;
    port.parse()
        .map_err(|_| Error::Config(format!("appUrl port '{}' is not a valid port", port)))
}

/// Configuration store for managing app settings.
///
/// Handles reading and writing configuration to `~/.scannerfy/config.json`.
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        Ok(Self {
            config_path: home.join(".scannerfy").join("config.json"),
        })
    }

    /// Create a config store with a custom path.
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub async fn save(&self, config: &Config) -> Result<()> {
        if let Some(config_dir) = self.config_path.parent() {
            fs::create_dir_all(config_dir)
                .await
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.config_path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to create temp config file: {}", e)))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        file.sync_all()
            .await
            .map_err(|e| Error::Config(format!("Failed to sync config: {}", e)))?;

        fs::rename(&temp_path, &self.config_path)
            .await
            .map_err(|e| Error::Config(format!("Failed to rename config file: {}", e)))?;

        Ok(())
    }

    /// Persist a new app URL, keeping the rest of the file.
    pub async fn set_app_url(&self, app_url: Option<String>) -> Result<()> {
        let mut config = self.load().await?;
        config.app_url = app_url;
        self.save(&config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store() -> (ConfigStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        (ConfigStore::with_path(path), dir)
    }

    fn with_url(url: &str) -> Config {
        Config {
            app_url: Some(url.to_string()),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _dir) = test_store();
        let config = store.load().await.unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.worker.startup_timeout_secs, 30);
        assert_eq!(config.export.jpeg_quality, 90);
        assert_eq!(config.export.image_format, ImageExportFormat::Png);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _dir) = test_store();

        let mut config = with_url("http://localhost:5000");
        config.worker.prestart = true;
        config.export.image_format = ImageExportFormat::Jpeg;
        store.save(&config).await.unwrap();

        assert_eq!(store.load().await.unwrap(), config);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_set_app_url_keeps_other_settings() {
        let (store, _dir) = test_store();
        let mut config = Config::default();
        config.export.jpeg_quality = 70;
        store.save(&config).await.unwrap();

        store
            .set_app_url(Some("http://0.0.0.0:8080".to_string()))
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.app_url.as_deref(), Some("http://0.0.0.0:8080"));
        assert_eq!(loaded.export.jpeg_quality, 70);
    }

    #[test]
    fn test_parse_camel_case_file() {
        let config: Config = serde_json::from_str(
            r#"{
                "appUrl": "http://localhost:5000",
                "worker": { "executable": "/opt/scannerfy-worker", "startupTimeoutSecs": 5 },
                "export": { "imageFormat": "tiff", "stagingDir": "/var/tmp" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.worker.executable, Some(PathBuf::from("/opt/scannerfy-worker")));
        assert_eq!(config.worker.startup_timeout_secs, 5);
        assert!(config.worker.args.is_empty());
        assert_eq!(config.export.image_format, ImageExportFormat::Tiff);
        assert_eq!(config.export.jpeg_quality, 90);
    }

    #[tokio::test]
    async fn test_invalid_file_is_config_error() {
        let (store, _dir) = test_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(store.load().await, Err(Error::Config(_))));
    }

    #[test]
    fn test_app_url_is_required_only_when_asked() {
        let config = Config::default();
        assert!(matches!(config.require_app_url(), Err(Error::Config(_))));
        assert!(with_url("   ").require_app_url().is_err());
        assert_eq!(
            with_url("http://localhost:5000").require_app_url().unwrap(),
            "http://localhost:5000"
        );
    }

    #[test]
    fn test_bind_address_and_port() {
        let config = with_url("http://localhost:5000");
        assert_eq!(config.bind_address().unwrap(), "localhost:5000");
        assert_eq!(config.port().unwrap(), 5000);

        let config = with_url("https://0.0.0.0:8443/api");
        assert_eq!(config.bind_address().unwrap(), "0.0.0.0:8443");

        assert_eq!(with_url("127.0.0.1:9000").port().unwrap(), 9000);
        assert!(with_url("http://localhost").port().is_err());
        assert!(with_url("http://localhost:http").bind_address().is_err());
    }

    #[test]
    fn test_custom_worker_launcher() {
        let worker = WorkerConfig {
            executable: Some(PathBuf::from("/opt/scannerfy-worker")),
            args: vec!["--serve".to_string()],
            ..WorkerConfig::default()
        };
        let launcher = worker.launcher().unwrap();
        assert_eq!(launcher.program(), &PathBuf::from("/opt/scannerfy-worker"));
    }
}
