use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Placeholder served to force-styled sites when the catalog has no fallback entry.
pub const FALLBACK_PLACEHOLDER_CSS: &str = "/* Default fallback CSS */";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StylingReason {
    GloballyDisabled,
    Whitelisted,
    NotWhitelisted,
    NotBlacklisted,
    Blacklisted,
    ForceWhitelisted,
    ForceNotWhitelisted,
    ForceNotBlacklisted,
    ForceBlacklisted,
    NoStylingRules,
    Error,
}

impl StylingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StylingReason::GloballyDisabled => "globally_disabled",
            StylingReason::Whitelisted => "whitelisted",
            StylingReason::NotWhitelisted => "not_whitelisted",
            StylingReason::NotBlacklisted => "not_blacklisted",
            StylingReason::Blacklisted => "blacklisted",
            StylingReason::ForceWhitelisted => "force_whitelisted",
            StylingReason::ForceNotWhitelisted => "force_not_whitelisted",
            StylingReason::ForceNotBlacklisted => "force_not_blacklisted",
            StylingReason::ForceBlacklisted => "force_blacklisted",
            StylingReason::NoStylingRules => "no_styling_rules",
            StylingReason::Error => "error",
        }
    }
}

impl fmt::Display for StylingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylingVerdict {
    pub should_apply: bool,
    pub reason: StylingReason,
}

impl StylingVerdict {
    pub fn new(should_apply: bool, reason: StylingReason) -> Self {
        Self {
            should_apply,
            reason,
        }
    }

    pub fn skip(reason: StylingReason) -> Self {
        Self::new(false, reason)
    }
}

/// Verdict and CSS for one hostname, computed in a single pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub verdict: StylingVerdict,
    pub css: Option<Arc<str>>,
}

impl Resolution {
    pub fn without_css(verdict: StylingVerdict) -> Self {
        Self { verdict, css: None }
    }
}

/// How membership in a rule list is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Listed hosts are the only ones styled.
    Whitelist,
    /// Listed hosts are skipped.
    Blacklist,
}

impl ListMode {
    pub fn from_flag(whitelist: bool) -> Self {
        if whitelist {
            ListMode::Whitelist
        } else {
            ListMode::Blacklist
        }
    }
}

/// Which rule list is being consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// `skipThemingList`, for hosts with a catalog style.
    Specific,
    /// `skipForceThemingList`, for force-styled hosts.
    Force,
}

/// The one place rule-list membership turns into a verdict.
pub fn evaluate_list(
    mode: ListMode,
    scope: ListScope,
    list: &[String],
    hostname: &str,
) -> StylingVerdict {
    let listed = list.iter().any(|entry| entry == hostname);
    let reason = match (scope, mode, listed) {
        (ListScope::Specific, ListMode::Whitelist, true) => StylingReason::Whitelisted,
        (ListScope::Specific, ListMode::Whitelist, false) => StylingReason::NotWhitelisted,
        (ListScope::Specific, ListMode::Blacklist, false) => StylingReason::NotBlacklisted,
        (ListScope::Specific, ListMode::Blacklist, true) => StylingReason::Blacklisted,
        (ListScope::Force, ListMode::Whitelist, true) => StylingReason::ForceWhitelisted,
        (ListScope::Force, ListMode::Whitelist, false) => StylingReason::ForceNotWhitelisted,
        (ListScope::Force, ListMode::Blacklist, false) => StylingReason::ForceNotBlacklisted,
        (ListScope::Force, ListMode::Blacklist, true) => StylingReason::ForceBlacklisted,
    };
    let should_apply = match mode {
        ListMode::Whitelist => listed,
        ListMode::Blacklist => !listed,
    };
    StylingVerdict::new(should_apply, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> Vec<String> {
        vec!["a.com".to_string()]
    }

    #[test]
    fn test_mode_flip_is_symmetric() {
        let white = evaluate_list(ListMode::Whitelist, ListScope::Specific, &list(), "a.com");
        let black = evaluate_list(ListMode::Blacklist, ListScope::Specific, &list(), "a.com");
        assert_eq!(white, StylingVerdict::new(true, StylingReason::Whitelisted));
        assert_eq!(black, StylingVerdict::new(false, StylingReason::Blacklisted));

        let white = evaluate_list(ListMode::Whitelist, ListScope::Specific, &list(), "b.com");
        let black = evaluate_list(ListMode::Blacklist, ListScope::Specific, &list(), "b.com");
        assert_eq!(white, StylingVerdict::new(false, StylingReason::NotWhitelisted));
        assert_eq!(black, StylingVerdict::new(true, StylingReason::NotBlacklisted));
    }

    #[test]
    fn test_force_scope_reasons() {
        let v = evaluate_list(ListMode::Blacklist, ListScope::Force, &list(), "a.com");
        assert_eq!(v, StylingVerdict::new(false, StylingReason::ForceBlacklisted));
        let v = evaluate_list(ListMode::Whitelist, ListScope::Force, &list(), "b.com");
        assert_eq!(v, StylingVerdict::new(false, StylingReason::ForceNotWhitelisted));
    }

    #[test]
    fn test_verdict_wire_format() {
        let v = StylingVerdict::new(true, StylingReason::ForceNotBlacklisted);
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "shouldApply": true, "reason": "force_not_blacklisted" })
        );
        assert_eq!(StylingReason::NoStylingRules.to_string(), "no_styling_rules");
    }
}
