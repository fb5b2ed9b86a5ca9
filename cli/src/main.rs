//! Scannerfy - Scan documents from network-reachable scanners
//!
//! Runs the HTTP scanning service, and offers the same operations
//! (device listing, scanning) directly from the command line.

mod commands;
mod server;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use scannerfy_core::{DriverId, PaperSource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "scannerfy=info,scannerfy_core=info,tower_http=warn";

#[derive(Parser)]
#[command(name = "scannerfy")]
#[command(author, version, about = "Scan documents from network-reachable scanners")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of ~/.scannerfy/config.json
    #[arg(long, global = true, env = "SCANNERFY_CONFIG")]
    config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP scanning service
    Serve {
        /// Public URL to serve on, e.g. http://localhost:5000
        #[arg(long, env = "SCANNERFY_APP_URL")]
        app_url: Option<String>,
    },

    /// List all reachable scanners
    #[command(alias = "ls")]
    Devices,

    /// Scan from a device into files
    Scan {
        /// Driver the device was listed under
        #[arg(long, value_parser = parse_driver)]
        driver: DriverId,

        /// Device id as reported by `devices`
        #[arg(long)]
        device: String,

        /// Resolution in dots per inch
        #[arg(long, default_value_t = 300)]
        dpi: i64,

        /// Paper source
        #[arg(long, value_enum, default_value_t = SourceArg::Flatbed)]
        source: SourceArg,

        /// Directory to write the scanned files into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Write one PDF instead of one image per page
        #[arg(long)]
        document: bool,
    },

    /// Show current configuration
    Config,

    /// Run as the scan worker (started by the service itself)
    #[command(hide = true)]
    Worker,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Flatbed,
    Feeder,
    Duplex,
}

impl From<SourceArg> for PaperSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Flatbed => PaperSource::Flatbed,
            SourceArg::Feeder => PaperSource::Feeder,
            SourceArg::Duplex => PaperSource::Duplex,
        }
    }
}

fn parse_driver(s: &str) -> Result<DriverId, String> {
    s.parse()
}

/// Log to stderr; in worker mode stdout carries the protocol.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    if let Commands::Worker = cli.command {
        return commands::worker::run().await;
    }

    let store = commands::config_store(cli.config)?;

    match cli.command {
        Commands::Serve { app_url } => server::run(&store, app_url).await?,
        Commands::Devices => commands::devices::run(&store, cli.json).await?,
        Commands::Scan {
            driver,
            device,
            dpi,
            source,
            output,
            document,
        } => {
            let options = commands::scan::ScanArgs {
                driver,
                device,
                dpi,
                source: source.into(),
                output,
                document,
            };
            commands::scan::run(&store, options, cli.json).await?
        }
        Commands::Config => commands::config::show(&store, cli.json).await?,
        Commands::Worker => unreachable!("worker mode returns early"),
    }

    Ok(())
}
