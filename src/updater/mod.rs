//! Periodic refresh of the remote style catalog into the store.

mod fetcher;

pub use fetcher::{CatalogFetcher, HttpFetcher};

use crate::config::UpdateConfig;
use crate::engine::StylingEngine;
use crate::settings::Settings;
use crate::stats::StatsCollector;
use crate::store::{keys, SettingsStore, StorageMap};
use anyhow::{bail, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(60);

pub struct CatalogUpdater {
    store: Arc<dyn SettingsStore>,
    engine: Arc<StylingEngine>,
    fetcher: Arc<dyn CatalogFetcher>,
    stats: Arc<StatsCollector>,
    default_url: String,
}

impl CatalogUpdater {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        engine: Arc<StylingEngine>,
        fetcher: Arc<dyn CatalogFetcher>,
        stats: Arc<StatsCollector>,
        config: &UpdateConfig,
    ) -> Self {
        Self {
            store,
            engine,
            fetcher,
            stats,
            default_url: config.repository_url.clone(),
        }
    }

    /// The stored repository override, or the configured default.
    pub async fn repository_url(&self) -> Result<String> {
        let data = self.store.get(&[keys::REPOSITORY_URL]).await?;
        let url = data
            .get(keys::REPOSITORY_URL)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .unwrap_or(self.default_url.as_str());
        Ok(url.to_string())
    }

    /// Fetches the catalog, stores it and rebuilds the engine's catalog.
    pub async fn refresh(&self) -> Result<()> {
        let url = self.repository_url().await?;
        info!("Fetching styles from: {}", url);

        let fetched = self.fetcher.fetch(&url).await;
        self.stats.record_fetch(fetched.is_ok());
        self.apply(fetched?).await?;

        info!("All styles refetched and updated from {}", url);
        Ok(())
    }

    /// Stores a fetched catalog document.
    ///
    /// Mappings shipped with the document replace the stored ones; a document
    /// without mappings keeps what is already stored.
    pub async fn apply(&self, styles: Value) -> Result<()> {
        if !styles.is_object() {
            bail!("Style catalog is not a JSON object");
        }

        let mapping = match styles.get("mapping").and_then(Value::as_object) {
            Some(mapping) if !mapping.is_empty() => {
                info!("Using {} mapping rules from repository", mapping.len());
                json!({ "mapping": mapping })
            }
            _ => {
                let existing = self.store.get(&[keys::STYLES_MAPPING]).await?;
                debug!("Catalog has no mappings, preserving stored mappings");
                existing
                    .get(keys::STYLES_MAPPING)
                    .cloned()
                    .unwrap_or_else(|| json!({ "mapping": {} }))
            }
        };

        let mut items = StorageMap::new();
        items.insert(keys::STYLES.to_string(), styles);
        items.insert(keys::STYLES_MAPPING.to_string(), mapping);
        self.store.set(items).await?;

        let data = self.store.get(&[keys::SETTINGS]).await?;
        let now = now_millis();
        let settings = match data.get(keys::SETTINGS) {
            Some(Value::Object(current)) => {
                let mut current = current.clone();
                current.insert("lastFetchedTime".to_string(), json!(now));
                Value::Object(current)
            }
            _ => {
                info!("Initialized default settings during first fetch");
                Settings {
                    last_fetched_time: Some(now),
                    ..Settings::default()
                }
                .to_value()
            }
        };

        let mut items = StorageMap::new();
        items.insert(keys::SETTINGS.to_string(), settings);
        self.store.set(items).await?;

        if !self.engine.rebuild().await? {
            debug!("Styling disabled, stored catalog will be applied once re-enabled");
        }
        Ok(())
    }

    async fn auto_update_enabled(&self) -> bool {
        match self.store.get(&[keys::SETTINGS]).await {
            Ok(data) => Settings::from_stored(data.get(keys::SETTINGS)).auto_update,
            Err(e) => {
                warn!("Could not read settings for auto-update: {:#}", e);
                false
            }
        }
    }

    /// Refreshes every `interval` while `autoUpdate` is on, and on every
    /// message from `refresh_rx` regardless of it.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        mut refresh_rx: mpsc::Receiver<()>,
    ) -> JoinHandle<()> {
        // A zero period panics inside tokio's interval.
        let interval = if interval.is_zero() {
            warn!("Catalog update interval is zero, using {:?}", MIN_UPDATE_INTERVAL);
            MIN_UPDATE_INTERVAL
        } else {
            interval
        };

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                let forced = tokio::select! {
                    _ = ticker.tick() => false,
                    msg = refresh_rx.recv() => {
                        if msg.is_none() {
                            info!("Refresh channel closed, stopping catalog updater");
                            break;
                        }
                        ticker.reset();
                        true
                    }
                };

                if forced {
                    info!("Forced catalog update triggered via API...");
                } else if self.auto_update_enabled().await {
                    info!("Scheduled catalog update...");
                } else {
                    debug!("Auto-update disabled, skipping scheduled catalog update");
                    continue;
                }

                if let Err(e) = self.refresh().await {
                    error!("Error refetching styles: {:#}", e);
                }
            }
        })
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
