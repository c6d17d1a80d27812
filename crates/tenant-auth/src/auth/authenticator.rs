//! Per-request authentication pipeline.
//!
//! Drives one request through
//! `Start -> OriginResolved -> TenantResolved -> KeysReady -> Verified -> Validated`.
//! Any stage can reject the request with an [`AuthError`]; a request without
//! a token ends at `Start` as [`AuthOutcome::Anonymous`].
//!
//! All per-request data lives in values owned by the call; the only shared
//! mutable state is inside the key resolver.

use crate::auth::claims::{validate, Principal};
use crate::auth::jwks::KeyResolver;
use crate::auth::jwt::TokenVerifier;
use crate::auth::origin::OriginPolicy;
use crate::config::AuthConfig;
use crate::directory::{TenantDirectory, TenantRecord};
use crate::errors::AuthError;
use crate::observability::metrics;
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use url::Url;

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Start,
    OriginResolved,
    TenantResolved,
    KeysReady,
    Verified,
    Validated,
}

impl AuthStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStage::Start => "start",
            AuthStage::OriginResolved => "origin_resolved",
            AuthStage::TenantResolved => "tenant_resolved",
            AuthStage::KeysReady => "keys_ready",
            AuthStage::Verified => "verified",
            AuthStage::Validated => "validated",
        }
    }
}

/// Credentials and origin extracted from one inbound request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    token: Option<SecretString>,
    origin: Option<String>,
}

impl AuthRequest {
    /// A blank token value counts as no token.
    pub fn new(token: Option<&str>, origin: Option<&str>) -> Self {
        Self {
            token: token
                .filter(|t| !t.trim().is_empty())
                .map(|t| SecretString::from(t.to_string())),
            origin: origin.map(str::to_string),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// Successful result of authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No credentials were presented.
    Anonymous,
    Authenticated(Principal),
}

impl AuthOutcome {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthOutcome::Authenticated(principal) => Some(principal),
            AuthOutcome::Anonymous => None,
        }
    }
}

/// Immutable per-request view of the tenant being authenticated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub domain: String,
    pub expected_issuer: String,
    pub key_set_location: Url,
}

impl From<TenantRecord> for TenantContext {
    fn from(record: TenantRecord) -> Self {
        Self {
            domain: record.domain,
            expected_issuer: record.issuer_authority,
            key_set_location: record.key_set_location,
        }
    }
}

/// Multi-tenant bearer token authenticator.
pub struct Authenticator {
    directory: Arc<dyn TenantDirectory>,
    key_resolver: Arc<dyn KeyResolver>,
    verifier: TokenVerifier,
    origin_policy: OriginPolicy,
    username_field: String,
}

impl Authenticator {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        key_resolver: Arc<dyn KeyResolver>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            directory,
            key_resolver,
            verifier: TokenVerifier::new(config.jwt_clock_skew),
            origin_policy: config.origin_policy(),
            username_field: config.username_field.clone(),
        }
    }

    /// Authenticate one request.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first stage that rejected the request.
    #[instrument(skip_all, name = "auth.authenticate")]
    pub async fn authenticate(&self, request: &AuthRequest) -> Result<AuthOutcome, AuthError> {
        let started = Instant::now();
        let result = self.run(request).await;
        metrics::record_authentication(&result, started.elapsed());

        match &result {
            Ok(AuthOutcome::Authenticated(_)) => {
                tracing::debug!(target: "auth.authenticator", "Request authenticated");
            }
            Ok(AuthOutcome::Anonymous) => {
                tracing::debug!(target: "auth.authenticator", "No credentials presented");
            }
            Err(_) => {}
        }

        result
    }

    async fn run(&self, request: &AuthRequest) -> Result<AuthOutcome, AuthError> {
        // Start
        let Some(token) = request.token.as_ref() else {
            return Ok(AuthOutcome::Anonymous);
        };

        // OriginResolved
        let domain = self
            .origin_policy
            .resolve(request.origin())
            .ok_or_else(|| reject(AuthStage::OriginResolved, AuthError::UnknownTenant))?;

        // TenantResolved
        let record = self
            .directory
            .resolve(&domain)
            .await
            .map_err(|e| reject(AuthStage::TenantResolved, e.into()))?;

        // KeysReady
        let tenant = TenantContext::from(record);

        // Verified
        let claims = self
            .verifier
            .verify(
                token.expose_secret(),
                self.key_resolver.as_ref(),
                &tenant.key_set_location,
            )
            .await
            .map_err(|e| reject(AuthStage::Verified, e.into()))?;

        // Validated
        let principal = validate(&claims, &tenant.expected_issuer, &self.username_field)
            .map_err(|e| reject(AuthStage::Validated, e.into()))?;

        Ok(AuthOutcome::Authenticated(principal))
    }
}

/// Log a rejection at the stage that failed to complete.
fn reject(stage: AuthStage, err: AuthError) -> AuthError {
    tracing::debug!(
        target: "auth.authenticator",
        stage = stage.as_str(),
        reason = err.reason(),
        "Request rejected"
    );
    err
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::jwks::{FetchError, PublicKey};
    use crate::directory::{DirectoryError, StaticTenantDirectory};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tenant_auth_test_utils::{TestSigningKey, TestTokenBuilder, TEST_RSA_EXPONENT};

    const ISSUER: &str = "https://idp.example/pool123";
    const ORIGIN: &str = "https://foo.bar.example.com";

    struct FixedKeys {
        keys: Vec<PublicKey>,
        lookups: AtomicUsize,
    }

    impl FixedKeys {
        fn new(signing_keys: &[TestSigningKey]) -> Arc<Self> {
            Arc::new(Self {
                keys: signing_keys
                    .iter()
                    .map(|k| {
                        PublicKey::from_rsa_components(&k.kid, k.modulus(), TEST_RSA_EXPONENT)
                            .unwrap()
                    })
                    .collect(),
                lookups: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl KeyResolver for FixedKeys {
        async fn get_key(&self, _location: &Url, kid: &str) -> Result<PublicKey, FetchError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.keys
                .iter()
                .find(|k| k.kid() == kid)
                .cloned()
                .ok_or(FetchError::KeyNotFound)
        }
    }

    struct DownDirectory;

    #[async_trait]
    impl TenantDirectory for DownDirectory {
        async fn resolve(&self, _domain: &str) -> Result<TenantRecord, DirectoryError> {
            Err(DirectoryError::Unavailable)
        }
    }

    fn directory() -> Arc<StaticTenantDirectory> {
        Arc::new(StaticTenantDirectory::new([TenantRecord::new(
            "bar.example",
            ISSUER,
        )
        .unwrap()]))
    }

    fn authenticator(keys: Arc<FixedKeys>) -> Authenticator {
        Authenticator::new(directory(), keys, &AuthConfig::default())
    }

    fn token(key: &TestSigningKey) -> String {
        key.sign(&TestTokenBuilder::new(ISSUER).build()).unwrap()
    }

    #[test]
    fn test_auth_request_blank_token_is_missing() {
        assert!(!AuthRequest::new(None, Some(ORIGIN)).has_token());
        assert!(!AuthRequest::new(Some("   "), Some(ORIGIN)).has_token());
        assert!(AuthRequest::new(Some("Bearer x"), None).has_token());
    }

    #[test]
    fn test_auth_request_debug_hides_token() {
        let request = AuthRequest::new(Some("Bearer super-secret-token"), Some(ORIGIN));
        let debug_str = format!("{request:?}");
        assert!(!debug_str.contains("super-secret-token"));
    }

    #[test]
    fn test_tenant_context_from_record() {
        let context = TenantContext::from(TenantRecord::new("bar.example", ISSUER).unwrap());

        assert_eq!(context.domain, "bar.example");
        assert_eq!(context.expected_issuer, ISSUER);
        assert_eq!(
            context.key_set_location.as_str(),
            "https://idp.example/pool123/.well-known/jwks.json"
        );
    }

    #[tokio::test]
    async fn test_authenticated() {
        let key = TestSigningKey::primary("key-1");
        let auth = authenticator(FixedKeys::new(&[key.clone()]));

        let outcome = auth
            .authenticate(&AuthRequest::new(Some(&token(&key)), Some(ORIGIN)))
            .await
            .unwrap();

        let principal = outcome.principal().unwrap();
        assert_eq!(principal.username(), "a@b.com");
        assert!(principal.has_role("ADMIN"));
    }

    #[tokio::test]
    async fn test_anonymous_without_token_does_no_work() {
        let keys = FixedKeys::new(&[]);
        let auth = Authenticator::new(Arc::new(DownDirectory), keys.clone(), &AuthConfig::default());

        let outcome = auth
            .authenticate(&AuthRequest::new(None, Some(ORIGIN)))
            .await
            .unwrap();

        assert_eq!(outcome, AuthOutcome::Anonymous);
        assert!(outcome.principal().is_none());
        assert_eq!(keys.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tenant() {
        let key = TestSigningKey::primary("key-1");
        let keys = FixedKeys::new(&[key.clone()]);
        let auth = authenticator(keys.clone());

        let err = auth
            .authenticate(&AuthRequest::new(
                Some(&token(&key)),
                Some("https://foo.other.example.com"),
            ))
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::UnknownTenant);
        assert_eq!(keys.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_default_domain_rejects_dev_origin() {
        let key = TestSigningKey::primary("key-1");
        let auth = authenticator(FixedKeys::new(&[key.clone()]));

        let err = auth
            .authenticate(&AuthRequest::new(
                Some(&token(&key)),
                Some("http://localhost:4200"),
            ))
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::UnknownTenant);
    }

    #[tokio::test]
    async fn test_dev_origin_uses_default_domain() {
        let key = TestSigningKey::primary("key-1");
        let config = AuthConfig {
            default_domain: Some("bar.example".to_string()),
            ..AuthConfig::default()
        };
        let auth = Authenticator::new(directory(), FixedKeys::new(&[key.clone()]), &config);

        let outcome = auth
            .authenticate(&AuthRequest::new(
                Some(&token(&key)),
                Some("http://localhost:4200"),
            ))
            .await
            .unwrap();

        assert!(outcome.principal().is_some());
    }

    #[tokio::test]
    async fn test_directory_unavailable() {
        let key = TestSigningKey::primary("key-1");
        let auth = Authenticator::new(
            Arc::new(DownDirectory),
            FixedKeys::new(&[key.clone()]),
            &AuthConfig::default(),
        );

        let err = auth
            .authenticate(&AuthRequest::new(Some(&token(&key)), Some(ORIGIN)))
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::BackendUnavailable);
    }

    #[tokio::test]
    async fn test_rejection_reasons_by_stage() {
        let key = TestSigningKey::primary("key-1");
        let auth = authenticator(FixedKeys::new(&[key.clone()]));

        let cases = [
            ("garbage".to_string(), AuthError::MalformedToken),
            (
                TestSigningKey::primary("stale-kid").sign(&TestTokenBuilder::new(ISSUER).build()).unwrap(),
                AuthError::KeyUnavailable,
            ),
            (
                TestSigningKey::secondary("key-1").sign(&TestTokenBuilder::new(ISSUER).build()).unwrap(),
                AuthError::BadSignature,
            ),
            (
                key.sign(&TestTokenBuilder::new(ISSUER).expires_in(-3600).build()).unwrap(),
                AuthError::Expired,
            ),
            (
                key.sign(&TestTokenBuilder::new(ISSUER).not_before_in(3600).build()).unwrap(),
                AuthError::NotYetValid,
            ),
            (
                key.sign(&TestTokenBuilder::new("https://idp.example/pool999").build()).unwrap(),
                AuthError::IssuerMismatch,
            ),
            (
                key.sign(&TestTokenBuilder::new(ISSUER).token_use("access").build()).unwrap(),
                AuthError::WrongTokenType,
            ),
            (
                key.sign(&TestTokenBuilder::new(ISSUER).without_claim("email").build()).unwrap(),
                AuthError::MissingUsername,
            ),
        ];

        for (token, expected) in cases {
            let err = auth
                .authenticate(&AuthRequest::new(Some(&token), Some(ORIGIN)))
                .await
                .unwrap_err();
            assert_eq!(err, expected, "expected {}", expected.reason());
        }
    }

    #[tokio::test]
    async fn test_custom_username_field() {
        let key = TestSigningKey::primary("key-1");
        let config = AuthConfig {
            username_field: "cognito:username".to_string(),
            ..AuthConfig::default()
        };
        let auth = Authenticator::new(directory(), FixedKeys::new(&[key.clone()]), &config);
        let token = key
            .sign(
                &TestTokenBuilder::new(ISSUER)
                    .with_claim("cognito:username", "alice")
                    .build(),
            )
            .unwrap();

        let outcome = auth
            .authenticate(&AuthRequest::new(Some(&token), Some(ORIGIN)))
            .await
            .unwrap();

        assert_eq!(outcome.principal().unwrap().username(), "alice");
    }

    #[tokio::test]
    async fn test_repeated_calls_are_idempotent() {
        let key = TestSigningKey::primary("key-1");
        let auth = authenticator(FixedKeys::new(&[key.clone()]));
        let request = AuthRequest::new(Some(&token(&key)), Some(ORIGIN));

        let first = auth.authenticate(&request).await;
        let second = auth.authenticate(&request).await;

        assert_eq!(first, second);
        assert!(first.unwrap().principal().is_some());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(AuthStage::Start.as_str(), "start");
        assert_eq!(AuthStage::Validated.as_str(), "validated");
    }
}
