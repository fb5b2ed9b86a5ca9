//! Devices command - list every reachable scanner.

use anyhow::Result;
use scannerfy_core::ConfigStore;

pub async fn run(store: &ConfigStore, json: bool) -> Result<()> {
    let config = store.load().await?;
    let service = super::build_service(&config)?;
    let devices = service.list_devices().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No scanners found.");
        return Ok(());
    }

    println!("{:<8} {:<40} NAME", "DRIVER", "DEVICE ID");
    println!("{}", "-".repeat(80));

    for device in &devices {
        println!(
            "{:<8} {:<40} {}",
            device.driver_id,
            truncate(&device.device_id, 40),
            device.display_name
        );
    }

    println!("\nTotal: {} devices", devices.len());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}
