//! Key-set cache for tenant identity provider signing keys.
//!
//! Each tenant's identity provider publishes its RSA signing keys as a JWKS
//! document. The cache keeps one [`KeySet`] per key-set location and refreshes
//! it when the TTL expires or when a token names a key id the snapshot does not
//! contain (key rotation).
//!
//! # Concurrency
//!
//! - Readers clone an `Arc<KeySet>` out of a short read lock, so they always
//!   see either the old or the new key set, never a partial one.
//! - Refreshes are serialized per location by an async mutex. A caller that
//!   waited on an in-flight refresh reuses its outcome instead of fetching
//!   again, so a burst of requests for an unknown key id costs one download.
//! - Every download is bounded by a connect timeout and an overall timeout.

use crate::observability::metrics;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;
use url::Url;

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default TCP/TLS connect timeout for key set downloads.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default time allowed for the response once connected.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5000);

/// Largest key set document accepted (1 MiB).
pub const MAX_JWKS_DOCUMENT_BYTES: usize = 1024 * 1024;

const RSA_KEY_TYPE: &str = "RSA";
const SIGNATURE_USE: &str = "sig";
const RS256: &str = "RS256";

/// Key set retrieval failure.
///
/// Carries no detail on purpose: the underlying transport or parse error is
/// logged where it happens and must not reach clients.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Key set endpoint unreachable")]
    Unreachable,

    #[error("Key set document invalid")]
    InvalidDocument,

    #[error("Signing key not found in key set")]
    KeyNotFound,
}

/// JSON Web Key as published by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for the keys this cache admits).
    #[serde(default)]
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm (should be "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// RS256 verification key, addressed by key id.
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    decoding_key: DecodingKey,
}

impl PublicKey {
    /// Build a key from base64url RSA components.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidDocument` if the components do not decode.
    pub fn from_rsa_components(kid: &str, n: &str, e: &str) -> Result<Self, FetchError> {
        let decoding_key =
            DecodingKey::from_rsa_components(n, e).map_err(|_| FetchError::InvalidDocument)?;
        Ok(Self {
            kid: kid.to_string(),
            decoding_key,
        })
    }

    /// Admit a JWK if it is a usable RS256 signing key.
    ///
    /// Returns `None` for keys of other types or uses, and for keys whose
    /// components are missing or undecodable.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        if jwk.kty != RSA_KEY_TYPE {
            return None;
        }
        if jwk.key_use.as_deref().is_some_and(|u| u != SIGNATURE_USE) {
            return None;
        }
        if jwk.alg.as_deref().is_some_and(|a| a != RS256) {
            return None;
        }
        let kid = jwk.kid.as_deref().filter(|k| !k.is_empty())?;
        let (n, e) = (jwk.n.as_deref()?, jwk.e.as_deref()?);
        Self::from_rsa_components(kid, n, e).ok()
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

/// Snapshot of one location's signing keys.
///
/// Never mutated after construction; a refresh builds a new one.
#[derive(Debug)]
pub struct KeySet {
    location: Url,
    keys: HashMap<String, PublicKey>,
    fetched_at: Instant,
}

impl KeySet {
    /// Build a key set from a parsed document, skipping unusable entries.
    pub fn from_document(location: Url, document: JwksDocument) -> Self {
        let total = document.keys.len();
        let keys: HashMap<String, PublicKey> = document
            .keys
            .iter()
            .filter_map(PublicKey::from_jwk)
            .map(|key| (key.kid.clone(), key))
            .collect();

        if keys.len() < total {
            tracing::debug!(
                target: "auth.jwks",
                skipped = total - keys.len(),
                "Skipped key set entries that are not RS256 signing keys"
            );
        }

        Self {
            location,
            keys,
            fetched_at: Instant::now(),
        }
    }

    pub fn get(&self, kid: &str) -> Option<&PublicKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Source of verification keys for a key-set location.
///
/// Implemented by [`JwksCache`]; tests substitute fixed resolvers.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Resolve `kid` at `location`, refreshing at most once.
    async fn get_key(&self, location: &Url, kid: &str) -> Result<PublicKey, FetchError>;
}

/// Timeouts and freshness window for [`JwksCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JwksCacheSettings {
    pub cache_ttl: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for JwksCacheSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Per-location cache entry.
#[derive(Default)]
struct CacheSlot {
    /// Published snapshot.
    current: RwLock<Option<Arc<KeySet>>>,

    /// Completed refresh attempts; bumped while the refresh lock is held.
    attempts: AtomicU64,

    /// Serializes refreshes and keeps the latest outcome for waiters.
    refresh: Mutex<Option<Result<Arc<KeySet>, FetchError>>>,
}

/// Caching, coalescing JWKS client shared by all tenants.
pub struct JwksCache {
    http_client: reqwest::Client,
    cache_ttl: Duration,
    slots: RwLock<HashMap<String, Arc<CacheSlot>>>,
}

impl JwksCache {
    /// Create a cache with the given settings.
    ///
    /// The overall request timeout is `connect_timeout + read_timeout`.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the HTTP client cannot be constructed.
    pub fn new(settings: JwksCacheSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.connect_timeout + settings.read_timeout)
            .build()?;

        Ok(Self {
            http_client,
            cache_ttl: settings.cache_ttl,
            slots: RwLock::new(HashMap::new()),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Currently published key set for `location`, if any.
    pub async fn snapshot(&self, location: &Url) -> Option<Arc<KeySet>> {
        let slot = self.slots.read().await.get(location.as_str()).cloned()?;
        let current = slot.current.read().await;
        current.clone()
    }

    async fn slot(&self, location: &Url) -> Arc<CacheSlot> {
        if let Some(slot) = self.slots.read().await.get(location.as_str()) {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(location.as_str().to_string()).or_default())
    }

    /// Refresh `slot`, or reuse the outcome of a refresh that completed while
    /// this caller was waiting for the lock.
    async fn refresh(
        &self,
        slot: &CacheSlot,
        location: &Url,
        observed_attempts: u64,
    ) -> Result<Arc<KeySet>, FetchError> {
        let mut last_outcome = slot.refresh.lock().await;

        if slot.attempts.load(Ordering::Acquire) != observed_attempts {
            if let Some(outcome) = last_outcome.as_ref() {
                tracing::debug!(target: "auth.jwks", "Reusing result of concurrent key set refresh");
                return outcome.clone();
            }
        }

        let outcome = self.fetch(location).await.map(Arc::new);

        if let Ok(key_set) = &outcome {
            *slot.current.write().await = Some(Arc::clone(key_set));
        }
        *last_outcome = Some(outcome.clone());
        slot.attempts.fetch_add(1, Ordering::Release);

        outcome
    }

    async fn fetch(&self, location: &Url) -> Result<KeySet, FetchError> {
        tracing::debug!(target: "auth.jwks", location = %location, "Fetching key set");

        let started = Instant::now();
        let result = self.download(location).await;
        metrics::record_jwks_fetch(result.as_ref().map(|_| ()).map_err(|e| *e), started.elapsed());

        let key_set = KeySet::from_document(location.clone(), result?);
        tracing::info!(
            target: "auth.jwks",
            location = %location,
            key_count = key_set.len(),
            "Key set cache refreshed"
        );
        Ok(key_set)
    }

    async fn download(&self, location: &Url) -> Result<JwksDocument, FetchError> {
        let response = self
            .http_client
            .get(location.clone())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "auth.jwks", location = %location, error = %e, "Failed to fetch key set");
                FetchError::Unreachable
            })?;

        if !response.status().is_success() {
            tracing::warn!(
                target: "auth.jwks",
                location = %location,
                status = %response.status(),
                "Key set endpoint returned error"
            );
            return Err(FetchError::Unreachable);
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_JWKS_DOCUMENT_BYTES as u64)
        {
            tracing::warn!(target: "auth.jwks", location = %location, "Key set document too large");
            return Err(FetchError::InvalidDocument);
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::warn!(target: "auth.jwks", location = %location, error = %e, "Failed to read key set body");
            FetchError::Unreachable
        })?;

        if body.len() > MAX_JWKS_DOCUMENT_BYTES {
            tracing::warn!(target: "auth.jwks", location = %location, "Key set document too large");
            return Err(FetchError::InvalidDocument);
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(target: "auth.jwks", location = %location, error = %e, "Failed to parse key set document");
            FetchError::InvalidDocument
        })
    }
}

#[async_trait]
impl KeyResolver for JwksCache {
    #[instrument(skip_all, name = "auth.jwks.get_key", fields(location = %location, kid = %kid))]
    async fn get_key(&self, location: &Url, kid: &str) -> Result<PublicKey, FetchError> {
        let slot = self.slot(location).await;
        let observed_attempts = slot.attempts.load(Ordering::Acquire);

        {
            let current = slot.current.read().await;
            if let Some(key_set) = current.as_ref().filter(|ks| ks.is_fresh(self.cache_ttl)) {
                if let Some(key) = key_set.get(kid) {
                    tracing::debug!(target: "auth.jwks", "Key set cache hit");
                    return Ok(key.clone());
                }
                tracing::debug!(target: "auth.jwks", "Key id not in cached key set, refreshing");
            }
        }

        let key_set = self.refresh(&slot, location, observed_attempts).await?;

        key_set.get(kid).cloned().ok_or_else(|| {
            tracing::warn!(target: "auth.jwks", "Key id not found after key set refresh");
            FetchError::KeyNotFound
        })
    }
}
