//! Worker command - serve driver requests over stdin/stdout.

use std::sync::Arc;

use anyhow::Result;
use scannerfy_core::adapters::worker::serve;
use scannerfy_core::DriverSet;

pub async fn run() -> Result<()> {
    serve(
        tokio::io::stdin(),
        tokio::io::stdout(),
        Arc::new(DriverSet::new()),
    )
    .await?;
    Ok(())
}
