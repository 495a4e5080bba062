use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use transparent_zen::config::Config;
use transparent_zen::engine::{StylingEngine, StylingReason, StylingVerdict};
use transparent_zen::stats::StatsCollector;
use transparent_zen::store::{
    ChangeListener, ListenerId, MemoryStore, SettingsStore, StorageArea, StorageMap,
};

fn items(value: Value) -> StorageMap {
    value.as_object().unwrap().clone()
}

async fn setup(entries: Value) -> (Arc<MemoryStore>, StylingEngine, Arc<StatsCollector>) {
    let store = Arc::new(MemoryStore::new());
    store.set(items(entries)).await.unwrap();
    let stats = StatsCollector::new();
    let engine = StylingEngine::new(store.clone(), &Config::default(), stats.clone());
    (store, engine, stats)
}

fn catalog() -> Value {
    json!({ "website": { "example.com.css": { "base": "body{color:red}" } } })
}

#[tokio::test]
async fn test_repeat_query_is_served_from_cache() {
    let (_store, engine, stats) = setup(json!({ "styles": catalog() })).await;

    let first = engine.determine_styling_state("example.com").await;
    let second = engine.determine_styling_state("example.com").await;

    assert_eq!(first, second);
    let snap = stats.get_snapshot();
    assert_eq!(snap.resolutions, 1);
    assert_eq!(snap.decision_cache_hits, 1);
}

#[tokio::test]
async fn test_settings_change_recomputes() {
    let (store, engine, _stats) = setup(json!({ "styles": catalog() })).await;

    assert_eq!(
        engine.determine_styling_state("other.com").await,
        StylingVerdict::skip(StylingReason::NoStylingRules)
    );

    store
        .set(items(json!({ "transparentZenSettings": { "forceStyling": true } })))
        .await
        .unwrap();

    assert_eq!(
        engine.determine_styling_state("other.com").await,
        StylingVerdict::new(true, StylingReason::ForceNotBlacklisted)
    );
}

#[tokio::test]
async fn test_rule_list_changes_recompute() {
    let (store, engine, _stats) = setup(json!({
        "styles": catalog(),
        "transparentZenSettings": { "forceStyling": true }
    }))
    .await;

    assert!(engine.determine_styling_state("example.com").await.should_apply);
    assert!(engine.determine_styling_state("other.com").await.should_apply);

    store
        .set(items(json!({ "skipThemingList": ["example.com"] })))
        .await
        .unwrap();
    assert_eq!(
        engine.determine_styling_state("example.com").await,
        StylingVerdict::new(false, StylingReason::Blacklisted)
    );

    store
        .set(items(json!({ "skipForceThemingList": ["other.com"] })))
        .await
        .unwrap();
    assert_eq!(
        engine.determine_styling_state("other.com").await,
        StylingVerdict::new(false, StylingReason::ForceBlacklisted)
    );
}

#[tokio::test]
async fn test_mapping_change_recomputes() {
    let (store, engine, _stats) = setup(json!({ "styles": catalog() })).await;

    assert_eq!(
        engine.determine_styling_state("mapped.com").await,
        StylingVerdict::skip(StylingReason::NoStylingRules)
    );

    store
        .set(items(json!({
            "stylesMapping": { "mapping": { "example.com.css": ["mapped.com"] } }
        })))
        .await
        .unwrap();

    assert_eq!(
        engine.determine_styling_state("mapped.com").await,
        StylingVerdict::new(true, StylingReason::NotBlacklisted)
    );
    assert_eq!(
        engine.resolve_css_for("mapped.com").await.as_deref(),
        Some("body{color:red}\n")
    );
}

#[tokio::test]
async fn test_catalog_change_rebuilds_lazily() {
    let (store, engine, stats) = setup(json!({ "styles": catalog() })).await;

    assert!(!engine.determine_styling_state("new.com").await.should_apply);
    assert_eq!(stats.get_snapshot().rebuilds, 1);

    store
        .set(items(json!({
            "styles": { "website": { "new.com": { "base": "new{}" } } }
        })))
        .await
        .unwrap();

    assert_eq!(
        engine.determine_styling_state("new.com").await,
        StylingVerdict::new(true, StylingReason::NotBlacklisted)
    );
    assert_eq!(stats.get_snapshot().rebuilds, 2);
    // The old catalog was replaced, not merged.
    assert!(engine.resolve_css_for("example.com").await.is_none());
}

#[tokio::test]
async fn test_unrelated_key_keeps_cache() {
    let (store, engine, stats) = setup(json!({ "styles": catalog() })).await;

    engine.determine_styling_state("example.com").await;
    store
        .set(items(json!({ "fallbackBackgroundList": ["x.com"] })))
        .await
        .unwrap();
    engine.determine_styling_state("example.com").await;

    assert_eq!(stats.get_snapshot().decision_cache_hits, 1);
    assert_eq!(stats.get_snapshot().invalidations, 0);
}

#[tokio::test]
async fn test_explicit_invalidate() {
    let (_store, engine, stats) = setup(json!({ "styles": catalog() })).await;

    engine.determine_styling_state("example.com").await;
    engine.invalidate();
    engine.determine_styling_state("example.com").await;

    assert_eq!(stats.get_snapshot().resolutions, 2);
    assert_eq!(stats.get_snapshot().decision_cache_hits, 0);
}

#[tokio::test]
async fn test_teardown_unsubscribes() {
    let (store, engine, _stats) = setup(json!({ "styles": catalog() })).await;

    engine.teardown();
    assert!(engine.catalog().is_empty());

    assert_eq!(
        engine.determine_styling_state("other.com").await,
        StylingVerdict::skip(StylingReason::NoStylingRules)
    );
    store
        .set(items(json!({ "transparentZenSettings": { "forceStyling": true } })))
        .await
        .unwrap();

    // No listener any more, so the old verdict is still served.
    assert_eq!(
        engine.determine_styling_state("other.com").await,
        StylingVerdict::skip(StylingReason::NoStylingRules)
    );
}

#[tokio::test]
async fn test_other_storage_area_is_ignored() {
    let store = Arc::new(MemoryStore::from_map(
        StorageArea::Sync,
        items(json!({ "styles": catalog() })),
    ));
    let stats = StatsCollector::new();
    let engine = StylingEngine::new(store.clone(), &Config::default(), stats.clone());

    engine.determine_styling_state("example.com").await;
    store
        .set(items(json!({ "skipThemingList": ["example.com"] })))
        .await
        .unwrap();

    assert_eq!(stats.get_snapshot().invalidations, 0);
    assert!(engine.determine_styling_state("example.com").await.should_apply);
}

/// Delegates to a `MemoryStore` but fails reads while `failing` is set.
struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

#[async_trait]
impl SettingsStore for FlakyStore {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("storage unavailable");
        }
        self.inner.get(keys).await
    }

    async fn set(&self, items: StorageMap) -> Result<()> {
        self.inner.set(items).await
    }

    fn on_changed(&self, listener: ChangeListener) -> ListenerId {
        self.inner.on_changed(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.inner.remove_listener(id)
    }
}

#[tokio::test]
async fn test_store_failure_is_not_cached() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::from_map(StorageArea::Local, items(json!({ "styles": catalog() }))),
        failing: AtomicBool::new(true),
    });
    let stats = StatsCollector::new();
    let engine = StylingEngine::new(store.clone(), &Config::default(), stats.clone());

    assert_eq!(
        engine.determine_styling_state("example.com").await,
        StylingVerdict::skip(StylingReason::Error)
    );
    assert!(engine.resolve_css_for("example.com").await.is_none());
    assert_eq!(stats.get_snapshot().resolution_errors, 1);

    store.failing.store(false, Ordering::SeqCst);
    assert_eq!(
        engine.determine_styling_state("example.com").await,
        StylingVerdict::new(true, StylingReason::NotBlacklisted)
    );
}

#[tokio::test]
async fn test_rebuild_is_skipped_while_disabled() {
    let (_store, engine, stats) = setup(json!({
        "styles": catalog(),
        "transparentZenSettings": { "enableStyling": false }
    }))
    .await;

    assert!(!engine.rebuild().await.unwrap());
    assert!(engine.catalog().is_empty());
    assert_eq!(stats.get_snapshot().rebuilds, 0);
}

#[tokio::test]
async fn test_catalog_change_while_disabled_applies_on_reenable() {
    let (store, engine, _stats) = setup(json!({
        "styles": { "website": { "old.com": { "f": "OLD" } } }
    }))
    .await;
    assert!(engine.determine_styling_state("old.com").await.should_apply);

    store
        .set(items(json!({ "transparentZenSettings": { "enableStyling": false } })))
        .await
        .unwrap();
    store
        .set(items(json!({ "styles": { "website": { "new.com": { "f": "NEW" } } } })))
        .await
        .unwrap();
    assert_eq!(
        engine.determine_styling_state("new.com").await,
        StylingVerdict::skip(StylingReason::GloballyDisabled)
    );

    store
        .set(items(json!({ "transparentZenSettings": { "enableStyling": true } })))
        .await
        .unwrap();

    assert_eq!(
        engine.resolve_css_for("new.com").await.as_deref(),
        Some("NEW\n")
    );
    assert!(engine.resolve_css_for("old.com").await.is_none());
    assert_eq!(
        engine.determine_styling_state("new.com").await,
        StylingVerdict::new(true, StylingReason::NotBlacklisted)
    );
}
