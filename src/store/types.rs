use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub type StorageMap = Map<String, Value>;

/// Storage area a change happened in. Only `Local` carries engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    Local,
    Sync,
}

impl StorageArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Local => "local",
            StorageArea::Sync => "sync",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub keys: Vec<String>,
    pub area: StorageArea,
}

impl StorageChange {
    pub fn touches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn touches_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.touches(key))
    }
}

/// Called synchronously from inside `SettingsStore::set`, after the write
/// is visible to readers and before `set` returns.
pub type ChangeListener = Arc<dyn Fn(&StorageChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Key-value store holding settings, rule lists, mapping rules and the
/// fetched style catalog.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns the stored values for `keys`. Absent keys are omitted.
    async fn get(&self, keys: &[&str]) -> Result<StorageMap>;

    /// Writes every entry of `items`, then notifies listeners of the keys
    /// whose value changed.
    async fn set(&self, items: StorageMap) -> Result<()>;

    fn on_changed(&self, listener: ChangeListener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);
}
