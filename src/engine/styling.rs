use super::catalog::StyleCatalog;
use super::decision::{
    evaluate_list, ListMode, ListScope, Resolution, StylingReason, StylingVerdict,
    FALLBACK_PLACEHOLDER_CSS,
};
use super::mapping::MappingRules;
use super::pattern::{normalize_hostname, style_key};
use super::state::DecisionCache;
use crate::config::Config;
use crate::settings::{rule_list, Settings};
use crate::stats::StatsCollector;
use crate::store::{keys, ChangeListener, ListenerId, SettingsStore, StorageArea, StorageChange};
use anyhow::Result;
use arc_swap::ArcSwap;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

/// Store keys whose change invalidates every cached verdict. `styles` is
/// included because a verdict depends on which sites have a style.
const DECISION_KEYS: [&str; 5] = [
    keys::SETTINGS,
    keys::SKIP_THEMING,
    keys::SKIP_FORCE_THEMING,
    keys::STYLES_MAPPING,
    keys::STYLES,
];

/// Decides, per hostname, whether styling applies and which CSS to serve.
///
/// Owns the style catalog (swapped whole on rebuild) and the decision cache
/// (cleared whenever one of `DECISION_KEYS` changes in the store).
pub struct StylingEngine {
    store: Arc<dyn SettingsStore>,
    catalog: ArcSwap<StyleCatalog>,
    decisions: DecisionCache,
    stats: Arc<StatsCollector>,
    fallback_style: Box<str>,
    log_decisions: bool,
    listener: Mutex<Option<ListenerId>>,
}

impl StylingEngine {
    /// Creates the engine and subscribes it to store changes.
    pub fn new(store: Arc<dyn SettingsStore>, config: &Config, stats: Arc<StatsCollector>) -> Self {
        let decisions = DecisionCache::new(config.engine.decision_cache_capacity);
        let listener = store.on_changed(Self::change_listener(decisions.clone(), stats.clone()));

        Self {
            store,
            catalog: ArcSwap::from_pointee(StyleCatalog::default()),
            decisions,
            stats,
            fallback_style: config.engine.fallback_style.as_str().into(),
            log_decisions: config.logging.log_decisions,
            listener: Mutex::new(Some(listener)),
        }
    }

    fn change_listener(decisions: DecisionCache, stats: Arc<StatsCollector>) -> ChangeListener {
        Arc::new(move |change: &StorageChange| {
            if change.area != StorageArea::Local {
                return;
            }
            // Stale flag first: a resolution that starts after the
            // generation bump must already see it.
            if change.touches(keys::STYLES) {
                decisions.mark_catalog_stale();
                debug!("Stored style catalog changed, marking catalog stale");
            }
            if change.touches_any(&DECISION_KEYS) {
                decisions.invalidate_all();
                stats.inc_invalidations();
                info!("Cleared styling state cache due to change of {:?}", change.keys);
            }
        })
    }

    /// Snapshot of the current catalog. Never partially built.
    pub fn catalog(&self) -> Arc<StyleCatalog> {
        self.catalog.load_full()
    }

    /// Rebuilds the catalog from the stored `styles` document and mapping
    /// rules. Does nothing while styling is globally disabled; returns
    /// whether a catalog was built.
    pub async fn rebuild(&self) -> Result<bool> {
        let data = self
            .store
            .get(&[keys::STYLES, keys::SETTINGS, keys::STYLES_MAPPING])
            .await?;

        let settings = Settings::from_stored(data.get(keys::SETTINGS));
        let mapping = MappingRules::from_stored(data.get(keys::STYLES_MAPPING));
        let document = data.get(keys::STYLES).cloned().unwrap_or(Value::Null);
        Ok(self.rebuild_from(&document, &mapping, &settings))
    }

    /// Builds a catalog from `document` and swaps it in. Returns `false`
    /// without touching the current catalog while styling is disabled.
    pub fn rebuild_from(
        &self,
        document: &Value,
        mapping: &MappingRules,
        settings: &Settings,
    ) -> bool {
        if !settings.enable_styling {
            debug!("Styling is globally disabled, skipping catalog rebuild");
            return false;
        }

        let catalog = StyleCatalog::build(document, mapping);
        info!("Style catalog rebuilt with {} entries", catalog.len());
        self.catalog.store(Arc::new(catalog));
        self.stats.inc_rebuilds();
        true
    }

    /// Clears every cached verdict.
    pub fn invalidate(&self) {
        self.decisions.invalidate_all();
        self.stats.inc_invalidations();
    }

    /// Unsubscribes from the store and drops both caches.
    pub fn teardown(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = listener {
            self.store.remove_listener(id);
        }
        self.catalog.store(Arc::new(StyleCatalog::default()));
        self.decisions.invalidate_all();
        info!("Styling engine torn down");
    }

    /// Cached `{shouldApply, reason}` for `hostname`.
    ///
    /// Verdicts are keyed by `hostname` exactly as given. A store failure
    /// yields an uncached `error` verdict.
    pub async fn determine_styling_state(&self, hostname: &str) -> StylingVerdict {
        if let Some(verdict) = self.decisions.get(hostname).await {
            self.stats.inc_decision_cache_hit();
            return verdict;
        }

        let generation = self.decisions.generation();
        match self.resolve(hostname).await {
            Ok(resolution) => {
                let verdict = resolution.verdict;
                self.decisions
                    .insert_if_current(hostname, verdict, generation)
                    .await;
                self.stats.inc_resolutions();
                if self.log_decisions {
                    info!(
                        "Styling for {}: {} ({})",
                        hostname,
                        if verdict.should_apply { "ON" } else { "OFF" },
                        verdict.reason
                    );
                }
                verdict
            }
            Err(e) => {
                self.stats.inc_resolution_error();
                error!("Error determining styling state for {}: {:#}", hostname, e);
                StylingVerdict::skip(StylingReason::Error)
            }
        }
    }

    /// CSS to deliver for `hostname` under the stored settings.
    pub async fn resolve_css_for(&self, hostname: &str) -> Option<Arc<str>> {
        let settings = match self.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                error!("Error loading settings for {}: {:#}", hostname, e);
                return None;
            }
        };
        self.resolve_css(hostname, &settings).await
    }

    /// CSS to deliver for `hostname` under `settings`.
    pub async fn resolve_css(&self, hostname: &str, settings: &Settings) -> Option<Arc<str>> {
        let result = match self.ensure_catalog().await {
            Ok(()) => self.resolve_with(hostname, settings).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(resolution) => {
                if resolution.css.is_some() {
                    self.stats.inc_css_delivered();
                }
                resolution.css
            }
            Err(e) => {
                error!("Error resolving styles for {}: {:#}", hostname, e);
                None
            }
        }
    }

    /// Full uncached resolution under the stored settings.
    pub async fn resolve(&self, hostname: &str) -> Result<Resolution> {
        self.ensure_catalog().await?;
        let settings = self.load_settings().await?;
        self.resolve_with(hostname, &settings).await
    }

    async fn ensure_catalog(&self) -> Result<()> {
        let stale = self.decisions.take_catalog_stale();
        let empty = self.catalog.load().is_empty();
        if stale || empty {
            debug!("Style catalog empty or stale, rebuilding");
            let rebuilt = self.rebuild().await;
            // A failed or skipped (styling disabled) rebuild leaves the stored
            // catalog unapplied.
            if stale && !matches!(rebuilt, Ok(true)) {
                self.decisions.mark_catalog_stale();
            }
            rebuilt?;
        }
        Ok(())
    }

    async fn load_settings(&self) -> Result<Settings> {
        let data = self.store.get(&[keys::SETTINGS]).await?;
        Ok(Settings::from_stored(data.get(keys::SETTINGS)))
    }

    async fn load_list(&self, key: &str) -> Result<Vec<String>> {
        let data = self.store.get(&[key]).await?;
        Ok(rule_list(data.get(key)))
    }

    async fn load_mapping(&self) -> Result<MappingRules> {
        let data = self.store.get(&[keys::STYLES_MAPPING]).await?;
        Ok(MappingRules::from_stored(data.get(keys::STYLES_MAPPING)))
    }

    /// Verdict and CSS in one pass.
    ///
    /// A host has a specific style when the catalog matches it or a mapping
    /// rule targets it. The skip-theming list gates the verdict only; CSS for
    /// a specific style is returned even when the verdict is negative. A
    /// mapping target whose source style is missing counts as specific for
    /// the verdict but takes its CSS from the force fallback.
    async fn resolve_with(&self, hostname: &str, settings: &Settings) -> Result<Resolution> {
        if !settings.enable_styling {
            return Ok(Resolution::without_css(StylingVerdict::skip(
                StylingReason::GloballyDisabled,
            )));
        }

        let host = normalize_hostname(hostname);
        let catalog = self.catalog.load_full();

        let mut css = catalog.lookup(host);
        let mut mapped = false;
        if css.is_none() {
            let mapping = self.load_mapping().await?;
            mapped = mapping.is_target(host);
            css = mapping
                .sources_for(host)
                .find_map(|source| catalog.get(style_key(source)));
        }

        if css.is_some() || mapped {
            let list = self.load_list(keys::SKIP_THEMING).await?;
            let mode = ListMode::from_flag(settings.whitelist_style_mode);
            let verdict = evaluate_list(mode, ListScope::Specific, &list, host);
            if css.is_none() && settings.force_styling {
                css = self.force_fallback(&catalog, host, settings).await?.css;
            }
            return Ok(Resolution { verdict, css });
        }

        if settings.force_styling {
            return self.force_fallback(&catalog, host, settings).await;
        }

        Ok(Resolution::without_css(StylingVerdict::skip(
            StylingReason::NoStylingRules,
        )))
    }

    async fn force_fallback(
        &self,
        catalog: &StyleCatalog,
        host: &str,
        settings: &Settings,
    ) -> Result<Resolution> {
        let list = self.load_list(keys::SKIP_FORCE_THEMING).await?;
        let mode = ListMode::from_flag(settings.whitelist_mode);
        let verdict = evaluate_list(mode, ListScope::Force, &list, host);

        let css = verdict.should_apply.then(|| {
            catalog
                .get(&self.fallback_style)
                .unwrap_or_else(|| Arc::from(FALLBACK_PLACEHOLDER_CSS))
        });
        Ok(Resolution { verdict, css })
    }
}

impl Drop for StylingEngine {
    fn drop(&mut self) {
        let listener = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = listener {
            self.store.remove_listener(id);
        }
    }
}
