//! Tenant directory.
//!
//! Maps a normalized tenant domain key to the tenant's identity provider
//! coordinates. Read-only; there is no fallback tenant at this layer.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// Path of the key set document below an issuer authority.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Identity provider coordinates of one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRecord {
    /// Normalized domain key, e.g. "bar.example".
    pub domain: String,

    /// Expected `iss` of this tenant's tokens.
    pub issuer_authority: String,

    /// Where the tenant's signing keys are published.
    pub key_set_location: Url,
}

impl TenantRecord {
    /// Record whose key set lives at the issuer's well-known JWKS path.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the issuer does not form a valid URL.
    pub fn new(domain: &str, issuer_authority: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            domain: domain.to_string(),
            issuer_authority: issuer_authority.to_string(),
            key_set_location: key_set_location_for(issuer_authority)?,
        })
    }

    /// Record for a hosted user pool identified by region and pool id.
    ///
    /// The issuer is `https://cognito-idp.{region}.amazonaws.com/{user_pool_id}`.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the identifiers do not form a valid URL.
    pub fn from_user_pool(
        domain: &str,
        region: &str,
        user_pool_id: &str,
    ) -> Result<Self, url::ParseError> {
        Self::new(
            domain,
            &format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}"),
        )
    }

    /// Override the derived key set location.
    pub fn with_key_set_location(mut self, key_set_location: Url) -> Self {
        self.key_set_location = key_set_location;
        self
    }
}

/// `{issuer_authority}/.well-known/jwks.json`
///
/// # Errors
///
/// Returns the parse error if the result is not a valid URL.
pub fn key_set_location_for(issuer_authority: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "{}{JWKS_PATH}",
        issuer_authority.trim_end_matches('/')
    ))
}

/// Directory lookup failure.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("tenant not found")]
    NotFound,

    #[error("tenant directory unavailable")]
    Unavailable,
}

/// Lookup contract for tenant identity provider coordinates.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Resolve a normalized domain key.
    async fn resolve(&self, domain: &str) -> Result<TenantRecord, DirectoryError>;

    /// Whether the backing store is reachable.
    async fn health_check(&self) -> Result<(), DirectoryError> {
        Ok(())
    }
}

/// In-memory directory built from a fixed list of records.
#[derive(Debug, Clone, Default)]
pub struct StaticTenantDirectory {
    records: HashMap<String, TenantRecord>,
}

impl StaticTenantDirectory {
    pub fn new(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.domain.clone(), record))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn resolve(&self, domain: &str) -> Result<TenantRecord, DirectoryError> {
        self.records.get(domain).cloned().ok_or_else(|| {
            tracing::debug!(target: "auth.directory", domain = %domain, "Tenant not found");
            DirectoryError::NotFound
        })
    }
}
