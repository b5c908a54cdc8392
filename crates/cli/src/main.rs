use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seisfetch_core::fdsn::HttpService;
use seisfetch_core::{load_config, DownloadOrchestrator, SqliteStore};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Config path: first argument, or SEISFETCH_CONFIG, or ./download.yaml
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SEISFETCH_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("download.yaml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    info!("Database: {}", config.dburl);

    let store = Arc::new(SqliteStore::open(&config.dburl).context("Failed to open database")?);
    let service = Arc::new(HttpService::new().context("Failed to create HTTP client")?);

    let orchestrator = DownloadOrchestrator::new(config, store, service)
        .context("Failed to initialize download run")?;
    let report = orchestrator.run().await.context("Download run failed")?;

    print!("{report}");
    Ok(())
}
