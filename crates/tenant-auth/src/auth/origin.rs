//! Request origin to tenant domain key.
//!
//! Tenants are addressed by a domain key derived from the `Origin` header:
//! with host labels `l[0..n]` and `n >= 3`, the key is `l[n-3].l[n-2]`, so
//! `https://foo.bar.example.com` belongs to tenant `bar.example`.
//!
//! Configured multi-label public suffixes (`co.uk`) count as one label.
//! Development origins, a missing origin and hosts the rule cannot apply to
//! fall back to the configured default domain; with no default configured they
//! resolve to nothing and the request is rejected.

use url::{Host, Url};

/// Origin used by the local front-end dev server.
pub const DEFAULT_DEV_ORIGIN: &str = "http://localhost:4200";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    default_domain: Option<String>,
    dev_origins: Vec<String>,
    multi_label_suffixes: Vec<String>,
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::new(None)
    }
}

impl OriginPolicy {
    /// Policy with the given fallback tenant and the default dev origin.
    pub fn new(default_domain: Option<String>) -> Self {
        Self {
            default_domain: default_domain.map(|d| d.to_ascii_lowercase()),
            dev_origins: vec![DEFAULT_DEV_ORIGIN.to_string()],
            multi_label_suffixes: Vec::new(),
        }
    }

    pub fn with_dev_origins(mut self, dev_origins: Vec<String>) -> Self {
        self.dev_origins = dev_origins
            .iter()
            .map(|o| normalize_origin_text(o))
            .collect();
        self
    }

    pub fn with_multi_label_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.multi_label_suffixes = suffixes
            .iter()
            .map(|s| s.trim().trim_matches('.').to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        // Longest suffix wins when several match
        self.multi_label_suffixes
            .sort_by(|a, b| b.len().cmp(&a.len()));
        self
    }

    pub fn default_domain(&self) -> Option<&str> {
        self.default_domain.as_deref()
    }

    /// Map a request origin to a tenant domain key.
    ///
    /// Returns `None` only when the fallback applies and no default domain is
    /// configured.
    pub fn resolve(&self, origin: Option<&str>) -> Option<String> {
        let Some(origin) = origin.map(str::trim).filter(|o| !o.is_empty()) else {
            tracing::debug!(target: "auth.origin", "No origin, using default domain");
            return self.default_domain.clone();
        };

        let normalized = normalize_origin_text(origin);
        if self.dev_origins.iter().any(|dev| *dev == normalized) {
            tracing::debug!(target: "auth.origin", "Development origin, using default domain");
            return self.default_domain.clone();
        }

        match domain_key_from_origin(origin, &self.multi_label_suffixes) {
            Some(domain) => {
                tracing::debug!(target: "auth.origin", domain = %domain, "Resolved tenant domain");
                Some(domain)
            }
            None => {
                tracing::debug!(target: "auth.origin", "Origin has no tenant domain, using default domain");
                self.default_domain.clone()
            }
        }
    }
}

/// Apply the domain-key rule to `origin`.
///
/// Returns `None` for unparseable origins, IP literals and hosts with fewer
/// than three labels.
pub fn domain_key_from_origin(origin: &str, multi_label_suffixes: &[String]) -> Option<String> {
    let url = Url::parse(origin).ok()?;
    let host = match url.host()? {
        Host::Domain(domain) => domain.to_ascii_lowercase(),
        Host::Ipv4(_) | Host::Ipv6(_) => return None,
    };
    let host = host.strip_suffix('.').unwrap_or(&host);

    let labels = collapse_suffix(host, multi_label_suffixes)?;
    if labels.iter().any(|l| l.is_empty()) {
        return None;
    }

    let n = labels.len();
    if n < 3 {
        return None;
    }
    let first = labels.get(n - 3)?;
    let second = labels.get(n - 2)?;
    Some(format!("{first}.{second}"))
}

fn collapse_suffix<'a>(host: &'a str, multi_label_suffixes: &'a [String]) -> Option<Vec<&'a str>> {
    for suffix in multi_label_suffixes {
        if host == suffix.as_str() {
            return None;
        }
        if let Some(rest) = host
            .strip_suffix(suffix.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
        {
            let mut labels: Vec<&str> = rest.split('.').collect();
            labels.push(suffix.as_str());
            return Some(labels);
        }
    }
    Some(host.split('.').collect())
}

/// Lowercase and drop a trailing slash so `http://LOCALHOST:4200/` matches.
fn normalize_origin_text(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}
