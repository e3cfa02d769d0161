//! Beacon relay server
//!
//! Serves the publisher API, polling and live WebSocket subscriptions on top
//! of the distribution engine.

mod routes;
mod transport;

use anyhow::{Context, Result};
use beacon_core::{version_string, DistributionService, KeyDirectory, RelayConfig, RocksDirectory};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::routes::{router, AppState};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "beacon-server")]
#[command(about = "Push-notification relay", long_about = None)]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides the config file)
    #[arg(short, long)]
    address: Option<String>,

    /// Key directory path (overrides the config file)
    #[arg(short, long)]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RelayConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RelayConfig::default(),
    };
    if let Some(address) = args.address {
        config.address = address;
    }
    if let Some(store) = args.store {
        config.storage_path = store;
    }

    init_tracing(config.extra_logging);
    info!("{}", version_string());

    let directory: Arc<dyn KeyDirectory> = Arc::new(
        RocksDirectory::open(&config.storage_path, config.user_cache)
            .with_context(|| format!("Failed to open key directory {}", config.storage_path.display()))?,
    );
    info!(path = %config.storage_path.display(), cache = config.user_cache, "Key directory opened");

    let service = Arc::new(DistributionService::from_config(directory, &config));
    match config.center_timeout() {
        Some(timeout) => info!("Notification centers expire after {:?}", timeout),
        None => info!("Notification centers never expire"),
    }
    if config.allow_incoming {
        warn!("Subscribers may broadcast to their centers (allow_incoming)");
    }

    let app = router(AppState {
        service: service.clone(),
        redirect_main_page: config.redirect_main_page.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.address))?;
    info!("Listening on http://{}", listener.local_addr()?);

    let stats = tokio::spawn(report_stats(service.clone()));

    let shutdown_service = service.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutting down");
            // Live sessions would otherwise hold the server open.
            shutdown_service.shutdown().await;
        })
        .await?;

    stats.abort();
    info!("Stopped");
    Ok(())
}

fn init_tracing(extra_logging: bool) {
    let default_directive = if extra_logging {
        "beacon_server=debug,beacon_core=debug"
    } else {
        "beacon_server=info,beacon_core=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)))
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn report_stats(service: Arc<DistributionService>) {
    let start_time = Instant::now();
    let mut interval = tokio::time::interval(STATS_INTERVAL);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let stats = service.stats().await;
        info!(
            uptime_secs = start_time.elapsed().as_secs(),
            centers = stats.centers,
            sessions = stats.sessions,
            "Relay statistics"
        );
    }
}
