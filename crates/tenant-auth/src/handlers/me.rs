//! Current principal handler.
//!
//! Returns the principal the auth middleware produced for this request.

use crate::auth::authenticator::AuthOutcome;
use crate::errors::AuthError;
use crate::middleware::auth::require_principal;
use crate::models::MeResponse;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /v1/me
///
/// Requires the auth middleware; anonymous requests get 401.
///
/// ## Response
///
/// Returns 200 OK with the principal:
///
/// ```json
/// {
///   "username": "a@b.com",
///   "roles": ["ADMIN"]
/// }
/// ```
#[instrument(skip_all, name = "auth.handlers.me")]
pub async fn get_me(Extension(outcome): Extension<AuthOutcome>) -> Result<Json<MeResponse>, AuthError> {
    let principal = require_principal(&outcome)?;

    Ok(Json(MeResponse {
        username: principal.username().to_string(),
        roles: principal.roles().iter().cloned().collect(),
    }))
}
