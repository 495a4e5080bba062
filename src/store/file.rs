//! JSON file backed store.
//!
//! The whole map lives in memory and is rewritten to disk on every `set`.
//! The file is written before the in-memory map is updated, so listeners
//! never observe a value that failed to persist.

use super::memory::MemoryStore;
use super::types::{ChangeListener, ListenerId, SettingsStore, StorageArea, StorageMap};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let exists = fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check store file {}", path.display()))?;
        let data = if exists {
            let contents = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read store file {}", path.display()))?;
            match serde_json::from_str::<Value>(&contents)
                .with_context(|| format!("Failed to parse store file {}", path.display()))?
            {
                Value::Object(map) => map,
                _ => bail!("Store file {} is not a JSON object", path.display()),
            }
        } else {
            info!("Store file {} not found, starting empty", path.display());
            StorageMap::new()
        };

        Ok(Self {
            path,
            inner: MemoryStore::from_map(StorageArea::Local, data),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &StorageMap) -> Result<()> {
        let contents =
            serde_json::to_vec_pretty(data).context("Failed to serialize store contents")?;

        // Write-then-rename keeps the previous file intact if we die mid-write.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Persisted {} keys to {}", data.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        self.inner.get(keys).await
    }

    async fn set(&self, items: StorageMap) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut merged = self.inner.snapshot()?;
        for (key, value) in &items {
            merged.insert(key.clone(), value.clone());
        }
        self.persist(&merged).await?;

        self.inner.set(items).await
    }

    fn on_changed(&self, listener: ChangeListener) -> ListenerId {
        self.inner.on_changed(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.inner.remove_listener(id)
    }
}
