mod catalog;
mod decision;
mod mapping;
mod pattern;
mod state;
mod styling;

pub use catalog::StyleCatalog;
pub use decision::{
    evaluate_list, ListMode, ListScope, Resolution, StylingReason, StylingVerdict,
    FALLBACK_PLACEHOLDER_CSS,
};
pub use mapping::{MappingRule, MappingRules};
pub use pattern::{normalize_hostname, style_key, SitePattern};
pub use state::DecisionCache;
pub use styling::StylingEngine;
