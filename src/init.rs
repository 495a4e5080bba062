//! Initialization helpers for the application startup.

use crate::config::Config;
use crate::settings::Settings;
use crate::store::{keys, JsonFileStore, SettingsStore, StorageMap};
use anyhow::Result;
use serde_json::{json, Value};
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Suppress HTTP client/server internals unless explicitly enabled/overridden
        for noisy in ["hyper", "reqwest"] {
            if !filter.contains(noisy) {
                filter.push_str(&format!(",{}=warn", noisy));
            }
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Opens the JSON file store named in the config.
pub async fn open_store(config: &Config) -> Result<JsonFileStore> {
    let store = JsonFileStore::open(&config.store_path).await?;
    info!("Using store file {}", store.path().display());
    Ok(store)
}

/// Writes defaulted settings back and creates any missing rule list or
/// mapping record, so every later read finds a complete store.
///
/// Returns the defaulted settings.
pub async fn initialize_store(store: &dyn SettingsStore) -> Result<Settings> {
    let data = store
        .get(&[
            keys::SETTINGS,
            keys::SKIP_FORCE_THEMING,
            keys::SKIP_THEMING,
            keys::FALLBACK_BACKGROUND,
            keys::STYLES_MAPPING,
        ])
        .await?;

    let mut items = StorageMap::new();

    let settings = Settings::from_stored(data.get(keys::SETTINGS));
    if let Some(record) = settings.write_back(data.get(keys::SETTINGS)) {
        info!("Initializing missing settings with defaults");
        items.insert(keys::SETTINGS.to_string(), record);
    }

    for list_key in [
        keys::SKIP_FORCE_THEMING,
        keys::SKIP_THEMING,
        keys::FALLBACK_BACKGROUND,
    ] {
        if !data.contains_key(list_key) {
            items.insert(list_key.to_string(), Value::Array(Vec::new()));
        }
    }

    if !data.contains_key(keys::STYLES_MAPPING) {
        items.insert(keys::STYLES_MAPPING.to_string(), json!({ "mapping": {} }));
    }

    if !items.is_empty() {
        store.set(items).await?;
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_initialize_fills_empty_store() {
        let store = MemoryStore::new();
        let settings = initialize_store(&store).await.unwrap();
        assert_eq!(settings, Settings::default());

        let data = store
            .get(&[
                keys::SETTINGS,
                keys::SKIP_THEMING,
                keys::SKIP_FORCE_THEMING,
                keys::FALLBACK_BACKGROUND,
                keys::STYLES_MAPPING,
            ])
            .await
            .unwrap();
        assert_eq!(data.len(), 5);
        assert_eq!(data[keys::SKIP_THEMING], json!([]));
        assert_eq!(data[keys::STYLES_MAPPING], json!({ "mapping": {} }));
        assert_eq!(data[keys::SETTINGS]["enableStyling"], json!(true));
    }

    #[tokio::test]
    async fn test_initialize_keeps_existing_values() {
        let store = MemoryStore::new();
        let mut items = StorageMap::new();
        items.insert(keys::SETTINGS.to_string(), json!({ "forceStyling": true }));
        items.insert(keys::SKIP_THEMING.to_string(), json!(["a.com"]));
        store.set(items).await.unwrap();

        let settings = initialize_store(&store).await.unwrap();
        assert!(settings.force_styling);

        let data = store
            .get(&[keys::SETTINGS, keys::SKIP_THEMING])
            .await
            .unwrap();
        assert_eq!(data[keys::SKIP_THEMING], json!(["a.com"]));
        assert_eq!(data[keys::SETTINGS]["forceStyling"], json!(true));
        assert_eq!(data[keys::SETTINGS]["whitelistMode"], json!(false));
    }

    #[tokio::test]
    async fn test_initialize_keeps_valid_fields_of_partly_malformed_record() {
        let store = MemoryStore::new();
        let mut items = StorageMap::new();
        items.insert(
            keys::SETTINGS.to_string(),
            json!({ "enableStyling": false, "fallbackBackgroundList": null, "custom": "x" }),
        );
        store.set(items).await.unwrap();

        let settings = initialize_store(&store).await.unwrap();
        assert!(!settings.enable_styling);

        let data = store.get(&[keys::SETTINGS]).await.unwrap();
        assert_eq!(data[keys::SETTINGS]["enableStyling"], json!(false));
        assert_eq!(data[keys::SETTINGS]["fallbackBackgroundList"], json!([]));
        assert_eq!(data[keys::SETTINGS]["custom"], json!("x"));
    }
}
