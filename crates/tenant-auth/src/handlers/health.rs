//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// Checks the tenant directory and reports the service status. Always
/// answers 200 so orchestrators can read the body.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "directory": "healthy"
/// }
/// ```
#[instrument(skip_all, name = "auth.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = match state.directory.health_check().await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        directory: status.to_string(),
    })
}
