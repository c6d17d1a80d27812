//! Mock identity provider for integration tests.
//!
//! Serves a JWKS document at `/{pool_id}/.well-known/jwks.json` on a local
//! wiremock server, so the issuer authority of a test tenant is
//! `{server_uri}/{pool_id}` exactly as with a hosted user pool.

use crate::crypto_fixtures::{jwks_document, TestSigningKey};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Local identity provider publishing a key set for one user pool.
pub struct MockIdentityProvider {
    server: MockServer,
    pool_id: String,
}

impl MockIdentityProvider {
    /// Start a mock provider for `pool_id` with no key set mounted yet.
    pub async fn start(pool_id: &str) -> Self {
        Self {
            server: MockServer::start().await,
            pool_id: pool_id.to_string(),
        }
    }

    /// Issuer authority tokens from this pool must carry in `iss`.
    pub fn issuer(&self) -> String {
        format!("{}/{}", self.server.uri(), self.pool_id)
    }

    /// Path of the key set document on the mock server.
    pub fn jwks_path(&self) -> String {
        format!("/{}/.well-known/jwks.json", self.pool_id)
    }

    /// Full URL of the key set document.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), self.jwks_path())
    }

    /// Publish `keys`, replacing anything mounted before.
    pub async fn publish_keys(&self, keys: &[TestSigningKey]) {
        self.server.reset().await;
        self.mount(ResponseTemplate::new(200).set_body_json(jwks_document(keys)), None)
            .await;
    }

    /// Publish `keys` and fail on drop unless exactly `fetches` requests arrive.
    pub async fn publish_keys_expecting(&self, keys: &[TestSigningKey], fetches: u64) {
        self.server.reset().await;
        self.mount(
            ResponseTemplate::new(200).set_body_json(jwks_document(keys)),
            Some(fetches),
        )
        .await;
    }

    /// Publish `keys` with a response delay, to hold refreshes in flight.
    pub async fn publish_keys_with_delay(&self, keys: &[TestSigningKey], delay: Duration) {
        self.server.reset().await;
        self.mount(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(keys))
                .set_delay(delay),
            None,
        )
        .await;
    }

    /// Make the key set endpoint answer with `status` and an empty body.
    pub async fn fail_with_status(&self, status: u16) {
        self.server.reset().await;
        self.mount(ResponseTemplate::new(status), None).await;
    }

    /// Serve an arbitrary body from the key set endpoint.
    pub async fn serve_raw(&self, body: &str) {
        self.server.reset().await;
        self.mount(
            ResponseTemplate::new(200).set_body_string(body.to_string()),
            None,
        )
        .await;
    }

    /// Number of key set requests received so far.
    pub async fn jwks_request_count(&self) -> usize {
        let jwks_path = self.jwks_path();
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == jwks_path)
            .count()
    }

    /// Verify all `expect`ations set on mounted mocks.
    pub async fn verify(&self) {
        self.server.verify().await;
    }

    async fn mount(&self, response: ResponseTemplate, expected: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(response);
        let mock = match expected {
            Some(n) => mock.expect(n),
            None => mock,
        };
        mock.mount(&self.server).await;
    }
}
