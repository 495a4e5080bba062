use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::info;

#[derive(Debug, Default)]
pub struct StatsCollector {
    resolutions: AtomicU64,
    decision_cache_hits: AtomicU64,
    resolution_errors: AtomicU64,
    invalidations: AtomicU64,
    rebuilds: AtomicU64,
    css_delivered: AtomicU64,
    catalog_fetches: AtomicU64,
    catalog_fetch_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub resolutions: u64,
    pub decision_cache_hits: u64,
    pub resolution_errors: u64,
    pub invalidations: u64,
    pub rebuilds: u64,
    pub css_delivered: u64,
    pub catalog_fetches: u64,
    pub catalog_fetch_failures: u64,
}

impl StatsCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_resolutions(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decision_cache_hit(&self) {
        self.decision_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_resolution_error(&self) {
        self.resolution_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_invalidations(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rebuilds(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_css_delivered(&self) {
        self.css_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self, ok: bool) {
        self.catalog_fetches.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.catalog_fetch_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            decision_cache_hits: self.decision_cache_hits.load(Ordering::Relaxed),
            resolution_errors: self.resolution_errors.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            css_delivered: self.css_delivered.load(Ordering::Relaxed),
            catalog_fetches: self.catalog_fetches.load(Ordering::Relaxed),
            catalog_fetch_failures: self.catalog_fetch_failures.load(Ordering::Relaxed),
        }
    }

    /// Logs a stats line every `interval` until the task is aborted.
    pub fn spawn_reporter(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let stats = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                stats.dump_stats();
            }
        })
    }

    fn dump_stats(&self) {
        let s = self.get_snapshot();
        let total = s.resolutions + s.decision_cache_hits;
        info!(
            "STATS DUMP: Decisions: {} (cache hits {:.1}%), Errors: {}, Invalidations: {}, Rebuilds: {}, CSS delivered: {}, Fetches: {} ({} failed)",
            total,
            if total > 0 {
                (s.decision_cache_hits as f64 / total as f64) * 100.0
            } else {
                0.0
            },
            s.resolution_errors,
            s.invalidations,
            s.rebuilds,
            s.css_delivered,
            s.catalog_fetches,
            s.catalog_fetch_failures
        );
    }
}
