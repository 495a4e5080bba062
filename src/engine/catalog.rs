use super::mapping::MappingRules;
use super::pattern::{normalize_hostname, self_and_parents, strip_last_label, style_key, SitePattern};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Immutable site pattern -> combined CSS table.
///
/// A catalog is never patched after `build`; a refresh builds a new one and
/// swaps it in whole.
#[derive(Debug, Default)]
pub struct StyleCatalog {
    // Pattern key (`a.com`, `+a.com`, `-a.com`) -> combined CSS
    entries: FxHashMap<Box<str>, Arc<str>>,
    // TLD-suffix index: labels without the TLD -> key of the first such pattern
    tld_domains: FxHashMap<Box<str>, Box<str>>,
}

impl StyleCatalog {
    /// Flattens `document.website` into combined CSS per pattern and copies
    /// each mapped style onto its target hostnames.
    pub fn build(document: &Value, mapping: &MappingRules) -> Self {
        let mut catalog = Self::default();

        let Some(websites) = document.get("website").and_then(Value::as_object) else {
            warn!("Style catalog has no 'website' section, building empty catalog");
            return catalog;
        };

        for (site_id, features) in websites {
            let Some(features) = features.as_object() else {
                debug!("Skipping catalog entry '{}': features are not an object", site_id);
                continue;
            };

            let mut combined = String::new();
            for css in features.values().filter_map(Value::as_str) {
                combined.push_str(css);
                combined.push('\n');
            }
            let combined: Arc<str> = combined.into();

            catalog.insert(style_key(site_id), combined.clone());

            for target in mapping.targets_of(site_id) {
                let target = normalize_hostname(target);
                debug!("Mapped {} styles to {}", site_id, target);
                catalog.insert(target, combined.clone());
            }
        }

        catalog
    }

    fn insert(&mut self, key: &str, css: Arc<str>) {
        if let Some(domain) = SitePattern::parse(key).tld_domain() {
            self.tld_domains
                .entry(domain.into())
                .or_insert_with(|| key.into());
        }
        self.entries.insert(key.into(), css);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry stored under exactly `key`, no pattern matching.
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.entries.get(key).cloned()
    }

    /// Resolves `hostname` against the catalog.
    ///
    /// Tiers are checked in order, first hit wins:
    /// 1. exact key, or its `www.` form
    /// 2. `+wildcard` on the host or a parent, most specific first
    /// 3. `-suffix` with the same labels minus the TLD
    /// 4. plain key equal to a parent domain, most specific first
    pub fn lookup(&self, hostname: &str) -> Option<Arc<str>> {
        let host = normalize_hostname(hostname);
        if host.is_empty() {
            return None;
        }

        // 1. Exact / www
        if let Some(css) = self.entries.get(host) {
            return Some(css.clone());
        }
        let mut probe = String::with_capacity(host.len() + 4);
        probe.push_str("www.");
        probe.push_str(host);
        if let Some(css) = self.entries.get(probe.as_str()) {
            return Some(css.clone());
        }

        // 2. Wildcard
        for part in self_and_parents(host) {
            probe.clear();
            probe.push('+');
            probe.push_str(part);
            if let Some(css) = self.entries.get(probe.as_str()) {
                return Some(css.clone());
            }
        }

        // 3. TLD suffix
        let host_domain = strip_last_label(host).unwrap_or(host);
        if let Some(key) = self.tld_domains.get(host_domain) {
            return self.entries.get(key).cloned();
        }

        // 4. Plain subdomain
        self_and_parents(host)
            .skip(1)
            .find_map(|parent| self.entries.get(parent).cloned())
    }
}
