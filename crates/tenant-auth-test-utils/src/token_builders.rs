//! Builder patterns for test data construction
//!
//! Provides a fluent API for identity-token claims shaped like the ones a
//! hosted user pool issues (`iss`, `token_use`, `email`, `exp`, ...).

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new("https://idp.example/pool123")
///     .with_claim("email", "a@b.com")
///     .expires_in(3600)
///     .build();
/// let token = TestSigningKey::primary("key-1").sign(&claims)?;
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create an ID token builder for `issuer` with sensible defaults.
    ///
    /// Defaults: `token_use = "id"`, `email = "a@b.com"`, valid for one hour.
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(issuer));
        claims.insert("sub".to_string(), json!("5f1c3a8e-test-subject"));
        claims.insert("aud".to_string(), json!("test-app-client"));
        claims.insert("token_use".to_string(), json!("id"));
        claims.insert("email".to_string(), json!("a@b.com"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        Self { claims }
    }

    /// Set the `token_use` claim ("id", "access", ...).
    pub fn token_use(self, token_use: &str) -> Self {
        self.with_claim("token_use", json!(token_use))
    }

    /// Set an arbitrary claim.
    pub fn with_claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    /// Remove a claim entirely.
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Set expiration in seconds from now (negative for already expired).
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set not-before in seconds from now.
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("nbf", json!(nbf))
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}
