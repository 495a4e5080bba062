use std::iter;

/// Strips a leading `www.`. No public-suffix awareness.
pub fn normalize_hostname(hostname: &str) -> &str {
    hostname.strip_prefix("www.").unwrap_or(hostname)
}

/// Catalog site ids may carry a `.css` suffix; the pattern key never does.
pub fn style_key(site_id: &str) -> &str {
    site_id.strip_suffix(".css").unwrap_or(site_id)
}

/// Everything before the last label, e.g. `example` for `example.co`.
pub(crate) fn strip_last_label(host: &str) -> Option<&str> {
    host.rfind('.').map(|idx| &host[..idx])
}

/// `host` followed by each parent domain: `a.b.c`, `b.c`, `c`.
pub(crate) fn self_and_parents(host: &str) -> impl Iterator<Item = &str> {
    iter::successors(Some(host), |part| {
        part.find('.')
            .map(|idx| &part[idx + 1..])
            .filter(|rest| !rest.is_empty())
    })
    .filter(|part| !part.is_empty())
}

/// A catalog key and the hostnames it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitePattern<'a> {
    /// `example.com`, also covering `www.example.com`.
    Exact(&'a str),
    /// `+example.com`: the base domain and every subdomain.
    Wildcard(&'a str),
    /// `-example.com`: any host whose labels minus the TLD equal `example`.
    TldSuffix(&'a str),
}

impl<'a> SitePattern<'a> {
    pub fn parse(key: &'a str) -> Self {
        if let Some(base) = key.strip_prefix('+') {
            SitePattern::Wildcard(base)
        } else if let Some(base) = key.strip_prefix('-') {
            SitePattern::TldSuffix(base)
        } else {
            SitePattern::Exact(key)
        }
    }

    /// Domain labels a `TldSuffix` pattern compares against. `None` for
    /// other variants and for single-label bases, which never match.
    pub fn tld_domain(&self) -> Option<&'a str> {
        match self {
            SitePattern::TldSuffix(base) => strip_last_label(base).filter(|d| !d.is_empty()),
            _ => None,
        }
    }
}
