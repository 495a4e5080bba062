use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

use transparent_zen::config::Config;
use transparent_zen::engine::StylingEngine;
use transparent_zen::init::{initialize_store, open_store, setup_logging};
use transparent_zen::stats::StatsCollector;
use transparent_zen::store::SettingsStore;
use transparent_zen::updater::{CatalogUpdater, HttpFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args().nth(1).unwrap_or("config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting transparent-zen...");

    if !std::path::Path::new(&config_path).exists() {
        info!("Config file not found, using defaults.");
    }

    // 3. Init Stats
    let stats = StatsCollector::new();
    let reporter = config.stats.enable.then(|| {
        stats.spawn_reporter(Duration::from_secs(config.stats.log_interval_seconds))
    });

    // 4. Open Store & fill in defaults
    let store: Arc<dyn SettingsStore> = Arc::new(open_store(&config).await?);
    let settings = initialize_store(store.as_ref()).await?;

    // 5. Init Engine & preload catalog
    let engine = Arc::new(StylingEngine::new(store.clone(), &config, stats.clone()));
    if let Err(e) = engine.rebuild().await {
        error!("Error preloading styles: {:#}", e);
    }

    // 6. Init Catalog Updater
    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(
        config.updates.timeout_secs,
    ))?);
    let updater = Arc::new(CatalogUpdater::new(
        store.clone(),
        engine.clone(),
        fetcher,
        stats.clone(),
        &config.updates,
    ));

    // First run: nothing to style until a catalog has been fetched once.
    if engine.catalog().is_empty() && settings.enable_styling {
        info!("No cached style catalog, fetching initial catalog...");
        if let Err(e) = updater.refresh().await {
            error!("Initial catalog fetch failed: {:#}", e);
        }
    }

    // 7. Spawn Periodic Updater (channel for forced refresh)
    let (refresh_tx, refresh_rx) = tokio::sync::mpsc::channel::<()>(1);
    let update_interval = Duration::from_secs(config.updates.interval_hours * 3600);
    let updater_task = updater.spawn(update_interval, refresh_rx);

    // 8. Start API Server
    let addr = SocketAddr::new(
        config.host.parse().context("Invalid host address")?,
        config.port,
    );
    let router = transparent_zen::api::router(
        engine.clone(),
        stats.clone(),
        config.clone(),
        refresh_tx,
    );

    // 9. Graceful Shutdown
    tokio::select! {
        result = transparent_zen::api::start_api_server(router, addr) => {
            if let Err(e) = result {
                error!("{:#}", e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    updater_task.abort();
    if let Some(reporter) = reporter {
        reporter.abort();
    }
    engine.teardown();

    Ok(())
}
