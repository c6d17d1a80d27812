//! Response models shared by the HTTP handlers.

use serde::{Deserialize, Serialize};

/// Health check response.
///
/// Returned by the `/v1/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Tenant directory connectivity ("healthy" or "unhealthy").
    pub directory: String,
}

/// Response for the `/v1/me` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    /// Username taken from the configured claim.
    pub username: String,

    /// Granted roles, sorted.
    pub roles: Vec<String>,
}
