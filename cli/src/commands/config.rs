//! Config command - show current configuration.

use anyhow::Result;
use scannerfy_core::ConfigStore;

pub async fn show(store: &ConfigStore, json: bool) -> Result<()> {
    let config = store.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("Config file: {}", store.path().display());
    println!();
    println!(
        "App URL:          {}",
        config.app_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Worker:           {}",
        config
            .worker
            .executable
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built in)".to_string())
    );
    println!("Startup timeout:  {}s", config.worker.startup_timeout_secs);
    println!("Prestart worker:  {}", config.worker.prestart);
    println!(
        "Image format:     {}",
        config.export.image_format.extension()
    );
    println!("JPEG quality:     {}", config.export.jpeg_quality);
    println!(
        "Staging dir:      {}",
        config
            .export
            .staging_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| std::env::temp_dir().display().to_string())
    );

    Ok(())
}
