//! HTTP surface integration tests.
//!
//! Drives the Axum router with `oneshot` requests: the public health and
//! metrics endpoints and the protected `/v1/me` endpoint.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tenant_auth::auth::{Authenticator, JwksCache};
use tenant_auth::config::AuthConfig;
use tenant_auth::directory::{
    DirectoryError, StaticTenantDirectory, TenantDirectory, TenantRecord,
};
use tenant_auth::middleware::AuthState;
use tenant_auth::routes::{build_routes, AppState};
use tenant_auth_test_utils::{MockIdentityProvider, TestSigningKey, TestTokenBuilder};
use tower::ServiceExt;

const ORIGIN: &str = "https://foo.bar.example.com";

struct DownDirectory;

#[async_trait]
impl TenantDirectory for DownDirectory {
    async fn resolve(&self, _domain: &str) -> Result<TenantRecord, DirectoryError> {
        Err(DirectoryError::Unavailable)
    }

    async fn health_check(&self) -> Result<(), DirectoryError> {
        Err(DirectoryError::Unavailable)
    }
}

fn build_app(directory: Arc<dyn TenantDirectory>, config: &AuthConfig) -> Result<Router> {
    let cache = Arc::new(JwksCache::new(config.jwks)?);
    let authenticator = Authenticator::new(directory.clone(), cache, config);

    let state = Arc::new(AppState {
        auth: Arc::new(AuthState {
            authenticator: Arc::new(authenticator),
            token_header: config.token_header.clone(),
        }),
        directory,
    });

    // Standalone recorder: tests must not install a global one
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    Ok(build_routes(state, metrics_handle))
}

async fn tenant_app(idp: &MockIdentityProvider) -> Result<Router> {
    let directory = StaticTenantDirectory::new([TenantRecord::new("bar.example", &idp.issuer())?]);
    build_app(Arc::new(directory), &AuthConfig::default())
}

fn me_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/v1/me")
        .header(header::ORIGIN, ORIGIN);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Result<serde_json::Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

fn www_authenticate(response: &axum::response::Response) -> Option<&str> {
    response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
}

// ============================================================================
// /v1/me
// ============================================================================

#[tokio::test]
async fn test_me_returns_principal() -> Result<()> {
    let idp = MockIdentityProvider::start("pool123").await;
    let key = TestSigningKey::primary("key-1");
    idp.publish_keys(&[key.clone()]).await;
    let app = tenant_app(&idp).await?;

    let token = key.sign(&TestTokenBuilder::new(&idp.issuer()).build())?;
    let response = app.oneshot(me_request(Some(&token))).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["username"], "a@b.com");
    assert_eq!(body["roles"], serde_json::json!(["ADMIN"]));
    Ok(())
}

#[tokio::test]
async fn test_me_without_token_is_unauthorized() -> Result<()> {
    let idp = MockIdentityProvider::start("pool123").await;
    let app = tenant_app(&idp).await?;

    let response = app.oneshot(me_request(None)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(www_authenticate(&response), Some("Bearer realm=\"tenant-api\""));
    let body = body_json(response).await?;
    assert_eq!(body["error"]["code"], "NO_CREDENTIALS");
    Ok(())
}

#[tokio::test]
async fn test_me_with_expired_token_is_unauthorized() -> Result<()> {
    let idp = MockIdentityProvider::start("pool123").await;
    let key = TestSigningKey::primary("key-1");
    idp.publish_keys(&[key.clone()]).await;
    let app = tenant_app(&idp).await?;

    let token = key.sign(&TestTokenBuilder::new(&idp.issuer()).expires_in(-3600).build())?;
    let response = app.oneshot(me_request(Some(&token))).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        www_authenticate(&response),
        Some("Bearer realm=\"tenant-api\", error=\"invalid_token\"")
    );
    let body = body_json(response).await?;
    assert_eq!(body["error"]["code"], "EXPIRED");

    // Client message never echoes token details
    let message = body["error"]["message"].as_str().unwrap();
    assert!(!message.contains(&token));
    assert!(!message.contains("a@b.com"));
    Ok(())
}

#[tokio::test]
async fn test_me_with_unknown_tenant_is_unauthorized() -> Result<()> {
    let idp = MockIdentityProvider::start("pool123").await;
    let key = TestSigningKey::primary("key-1");
    idp.publish_keys(&[key.clone()]).await;
    let app = tenant_app(&idp).await?;

    let token = key.sign(&TestTokenBuilder::new(&idp.issuer()).build())?;
    let request = Request::builder()
        .uri("/v1/me")
        .header(header::ORIGIN, "https://app.unknown.example.com")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await?["error"]["code"], "UNKNOWN_TENANT");
    Ok(())
}

#[tokio::test]
async fn test_me_with_provider_down_is_service_unavailable() -> Result<()> {
    let idp = MockIdentityProvider::start("pool123").await;
    idp.fail_with_status(500).await;
    let app = tenant_app(&idp).await?;

    let token = TestSigningKey::primary("key-1").sign(&TestTokenBuilder::new(&idp.issuer()).build())?;
    let response = app.oneshot(me_request(Some(&token))).await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(www_authenticate(&response).is_none());
    assert_eq!(body_json(response).await?["error"]["code"], "BACKEND_UNAVAILABLE");
    Ok(())
}

#[tokio::test]
async fn test_me_with_directory_down_is_service_unavailable() -> Result<()> {
    let app = build_app(Arc::new(DownDirectory), &AuthConfig::default())?;

    let response = app.oneshot(me_request(Some("header.payload.signature"))).await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn test_me_with_custom_token_header() -> Result<()> {
    let idp = MockIdentityProvider::start("pool123").await;
    let key = TestSigningKey::primary("key-1");
    idp.publish_keys(&[key.clone()]).await;

    let config = AuthConfig {
        token_header: header::HeaderName::from_static("x-id-token"),
        ..AuthConfig::default()
    };
    let directory = StaticTenantDirectory::new([TenantRecord::new("bar.example", &idp.issuer())?]);
    let app = build_app(Arc::new(directory), &config)?;

    let token = key.sign(&TestTokenBuilder::new(&idp.issuer()).build())?;
    let request = Request::builder()
        .uri("/v1/me")
        .header(header::ORIGIN, ORIGIN)
        .header("x-id-token", token)
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["username"], "a@b.com");
    Ok(())
}

// ============================================================================
// Public endpoints
// ============================================================================

#[tokio::test]
async fn test_health_check_healthy() -> Result<()> {
    let app = build_app(Arc::new(StaticTenantDirectory::default()), &AuthConfig::default())?;

    let request = Request::builder().uri("/v1/health").body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["directory"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_health_check_reports_directory_outage() -> Result<()> {
    let app = build_app(Arc::new(DownDirectory), &AuthConfig::default())?;

    let request = Request::builder().uri("/v1/health").body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["status"], "unhealthy");
    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<()> {
    let app = build_app(Arc::new(StaticTenantDirectory::default()), &AuthConfig::default())?;

    let request = Request::builder().uri("/metrics").body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
