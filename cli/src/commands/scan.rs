//! Scan command - scan from one device into files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use scannerfy_core::{ConfigStore, DeviceRef, DriverId, PaperSource, ScanOptions};

pub struct ScanArgs {
    pub driver: DriverId,
    pub device: String,
    pub dpi: i64,
    pub source: PaperSource,
    pub output: PathBuf,
    pub document: bool,
}

pub async fn run(store: &ConfigStore, args: ScanArgs, json: bool) -> Result<()> {
    let config = store.load().await?;
    let service = super::build_service(&config)?;

    let options = ScanOptions::new(
        Some(DeviceRef::new(args.driver, args.device)),
        args.dpi,
        args.source,
    );

    let artifacts = if args.document {
        vec![service.scan_images_as_document(options).await?]
    } else {
        service.scan_images(options).await?
    };

    tokio::fs::create_dir_all(&args.output)
        .await
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        let path = args.output.join(&artifact.suggested_file_name);
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&written)?);
    } else {
        for path in &written {
            println!("✓ Wrote {}", path.display());
        }
    }
    Ok(())
}
