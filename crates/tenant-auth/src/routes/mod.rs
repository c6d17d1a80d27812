//! HTTP routes for the tenant auth service.
//!
//! Defines the Axum router and application state.

use crate::directory::TenantDirectory;
use crate::handlers;
use crate::middleware::auth::{authenticate_request, AuthState};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authentication middleware state.
    pub auth: Arc<AuthState>,

    /// Tenant directory, also probed by the health check.
    pub directory: Arc<dyn TenantDirectory>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/health` - Health check endpoint (directory ping)
/// - `/metrics` - Prometheus scrape endpoint
/// - `/v1/me` - Authenticated principal (requires a valid token)
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication middleware runs first)
    let protected_routes = Router::new()
        .route("/v1/me", get(handlers::get_me))
        .route_layer(from_fn_with_state(state.auth.clone(), authenticate_request));

    // Apply global middleware layers
    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
