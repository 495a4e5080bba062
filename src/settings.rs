//! User settings as stored under [`keys::SETTINGS`](crate::store::keys::SETTINGS).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Master switch.
    pub enable_styling: bool,
    /// Periodic catalog refetch.
    pub auto_update: bool,
    /// Apply fallback styling to sites with no specific style.
    pub force_styling: bool,
    /// List semantics for force styling.
    pub whitelist_mode: bool,
    /// List semantics for specific-style skipping.
    pub whitelist_style_mode: bool,
    pub disable_transparency: bool,
    pub disable_hover: bool,
    pub disable_footer: bool,
    pub fallback_background_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetched_time: Option<i64>,
    /// Fields we do not interpret, kept so write-backs don't drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_styling: true,
            auto_update: true,
            force_styling: false,
            whitelist_mode: false,
            whitelist_style_mode: false,
            disable_transparency: false,
            disable_hover: false,
            disable_footer: false,
            fallback_background_list: Vec::new(),
            last_fetched_time: None,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Merges a stored (possibly partial) record onto the defaults, field by
    /// field. A field with the wrong type falls back to its default without
    /// affecting the others.
    pub fn from_stored(stored: Option<&Value>) -> Self {
        let record = match stored {
            None | Some(Value::Null) => return Self::default(),
            Some(Value::Object(record)) => record,
            Some(other) => {
                warn!("Stored settings are not an object, using defaults: {}", other);
                return Self::default();
            }
        };

        let mut merged = match Self::default().to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in record {
            let mut candidate = merged.clone();
            candidate.insert(key.clone(), value.clone());
            match serde_json::from_value::<Settings>(Value::Object(candidate.clone())) {
                Ok(_) => merged = candidate,
                Err(e) => warn!("Ignoring malformed setting '{}': {}", key, e),
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or_default()
    }

    /// The record to store so every field is present and well-typed, or
    /// `None` when `stored` already is. Stored keys that are valid are kept
    /// as they are; only missing or malformed ones are replaced.
    pub fn write_back(&self, stored: Option<&Value>) -> Option<Value> {
        let Value::Object(defaulted) = self.to_value() else {
            return None;
        };
        let mut record = match stored {
            Some(Value::Object(record)) => record.clone(),
            _ => Map::new(),
        };

        let mut changed = !matches!(stored, Some(Value::Object(_)));
        for (key, value) in defaulted {
            if record.get(&key) != Some(&value) {
                record.insert(key, value);
                changed = true;
            }
        }
        changed.then_some(Value::Object(record))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Reads a rule list, ignoring non-string entries.
pub fn rule_list(stored: Option<&Value>) -> Vec<String> {
    stored
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
