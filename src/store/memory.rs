use super::types::{
    ChangeListener, ListenerId, SettingsStore, StorageArea, StorageChange, StorageMap,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// In-process store. Also the backing map of `JsonFileStore`.
pub struct MemoryStore {
    area: StorageArea,
    data: RwLock<StorageMap>,
    listeners: RwLock<Vec<(ListenerId, ChangeListener)>>,
    next_listener: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_map(StorageArea::Local, StorageMap::new())
    }

    pub fn from_map(area: StorageArea, data: StorageMap) -> Self {
        Self {
            area,
            data: RwLock::new(data),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> Result<StorageMap> {
        let guard = self
            .data
            .read()
            .map_err(|_| anyhow!("storage lock poisoned"))?;
        Ok(guard.clone())
    }

    fn write(&self, items: StorageMap) -> Result<Vec<String>> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("storage lock poisoned"))?;

        let mut changed = Vec::new();
        for (key, value) in items {
            if guard.get(&key) != Some(&value) {
                changed.push(key.clone());
                guard.insert(key, value);
            }
        }
        Ok(changed)
    }

    fn notify(&self, change: &StorageChange) {
        // Listeners may touch the store again, so call them without holding the lock.
        let listeners: Vec<ChangeListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(change);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        let guard = self
            .data
            .read()
            .map_err(|_| anyhow!("storage lock poisoned"))?;

        let mut out = StorageMap::new();
        for key in keys {
            if let Some(value) = guard.get(*key) {
                out.insert((*key).to_string(), value.clone());
            }
        }
        Ok(out)
    }

    async fn set(&self, items: StorageMap) -> Result<()> {
        let changed = self.write(items)?;
        if !changed.is_empty() {
            self.notify(&StorageChange {
                keys: changed,
                area: self.area,
            });
        }
        Ok(())
    }

    fn on_changed(&self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _)| *existing != id);
    }
}
