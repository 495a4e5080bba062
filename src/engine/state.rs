use super::decision::StylingVerdict;
use moka::future::Cache;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Per-hostname verdict memo plus the flags store listeners flip.
///
/// Cloning shares the underlying state; the store listener holds one clone
/// and the engine another.
#[derive(Clone)]
pub struct DecisionCache {
    verdicts: Cache<Arc<str>, StylingVerdict>,
    // Bumped on every invalidation. A verdict computed under an older
    // generation is never kept.
    generation: Arc<AtomicU64>,
    catalog_stale: Arc<AtomicBool>,
}

impl DecisionCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            verdicts: Cache::builder().max_capacity(capacity).build(),
            generation: Arc::new(AtomicU64::new(0)),
            catalog_stale: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn get(&self, hostname: &str) -> Option<StylingVerdict> {
        self.verdicts.get(hostname).await
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Stores `verdict` unless an invalidation happened since `generation`
    /// was read. Returns whether the entry was kept.
    pub async fn insert_if_current(
        &self,
        hostname: &str,
        verdict: StylingVerdict,
        generation: u64,
    ) -> bool {
        if self.generation() != generation {
            return false;
        }
        self.verdicts.insert(Arc::from(hostname), verdict).await;

        // An invalidation may have slipped in between the check and the insert.
        if self.generation() != generation {
            self.verdicts.invalidate(hostname).await;
            return false;
        }
        true
    }

    /// Drops every verdict. Synchronous so store listeners can call it.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.verdicts.invalidate_all();
    }

    pub fn mark_catalog_stale(&self) {
        self.catalog_stale.store(true, Ordering::SeqCst);
    }

    /// Clears and returns the stale flag.
    pub fn take_catalog_stale(&self) -> bool {
        self.catalog_stale.swap(false, Ordering::SeqCst)
    }
}
