//! Metrics definitions for tenant authentication.
//!
//! All metrics follow Prometheus naming conventions:
//! - `tenant_auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: 3 values (authenticated, anonymous, rejected)
//! - `reason`: bounded by `AuthError` reason codes plus "none"
//! - `status`: 3 values (success, unreachable, invalid_document)
//!
//! Tenant domains, key ids and usernames are never used as labels.

use crate::auth::authenticator::AuthOutcome;
use crate::auth::jwks::FetchError;
use crate::errors::AuthError;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Whole-request authentication, dominated by cache hits
        .set_buckets_for_metric(
            Matcher::Prefix("tenant_auth_duration".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set authentication buckets: {e}"))?
        // Key set fetches go over the network and are bounded by the HTTP timeouts
        .set_buckets_for_metric(
            Matcher::Prefix("tenant_auth_jwks_fetch_duration".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set key set fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record one completed authentication attempt.
///
/// Metric: `tenant_auth_requests_total`, `tenant_auth_duration_seconds`
/// Labels: `outcome`, `reason`
pub fn record_authentication(result: &Result<AuthOutcome, AuthError>, duration: Duration) {
    let (outcome, reason) = match result {
        Ok(AuthOutcome::Authenticated(_)) => ("authenticated", "none"),
        Ok(AuthOutcome::Anonymous) => ("anonymous", "none"),
        Err(err) => ("rejected", err.reason()),
    };

    histogram!("tenant_auth_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());

    counter!("tenant_auth_requests_total", "outcome" => outcome, "reason" => reason).increment(1);
}

// ============================================================================
// Key Set Fetch Metrics
// ============================================================================

/// Record one key set download.
///
/// Metric: `tenant_auth_jwks_fetch_total`, `tenant_auth_jwks_fetch_duration_seconds`
/// Labels: `status`
pub fn record_jwks_fetch(result: Result<(), FetchError>, duration: Duration) {
    let status = match result {
        Ok(()) => "success",
        Err(FetchError::Unreachable) => "unreachable",
        // KeyNotFound is decided after a fetch, never by one
        Err(FetchError::InvalidDocument | FetchError::KeyNotFound) => "invalid_document",
    };

    histogram!("tenant_auth_jwks_fetch_duration_seconds").record(duration.as_secs_f64());

    counter!("tenant_auth_jwks_fetch_total", "status" => status).increment(1);
}
