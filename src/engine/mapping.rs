use super::pattern::style_key;
use serde_json::{Map, Value};

/// One catalog style redirected to extra hostnames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub source: Box<str>,
    pub targets: Vec<Box<str>>,
}

/// Mapping rules in stored order, as kept under `stylesMapping.mapping`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingRules {
    rules: Vec<MappingRule>,
}

impl MappingRules {
    /// Parses the stored `{ "mapping": { source: [targets] } }` record.
    pub fn from_stored(stored: Option<&Value>) -> Self {
        stored
            .and_then(|v| v.get("mapping"))
            .and_then(Value::as_object)
            .map(Self::from_mapping)
            .unwrap_or_default()
    }

    /// Parses a bare `{ source: [targets] }` object. Non-array values and
    /// non-string targets are skipped.
    pub fn from_mapping(mapping: &Map<String, Value>) -> Self {
        let rules = mapping
            .iter()
            .filter_map(|(source, targets)| {
                let targets = targets
                    .as_array()?
                    .iter()
                    .filter_map(Value::as_str)
                    .map(Into::into)
                    .collect();
                Some(MappingRule {
                    source: source.as_str().into(),
                    targets,
                })
            })
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Targets of every rule whose source names the same style as `site_id`.
    pub fn targets_of<'a>(&'a self, site_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let key = style_key(site_id);
        self.rules
            .iter()
            .filter(move |rule| style_key(&rule.source) == key)
            .flat_map(|rule| rule.targets.iter().map(|t| &**t))
    }

    /// Sources of rules listing `hostname` as a target, in stored order.
    pub fn sources_for<'a>(&'a self, hostname: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.targets.iter().any(|t| &**t == hostname))
            .map(|rule| &*rule.source)
    }

    pub fn is_target(&self, hostname: &str) -> bool {
        self.sources_for(hostname).next().is_some()
    }
}
