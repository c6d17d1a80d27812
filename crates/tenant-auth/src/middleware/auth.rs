//! Authentication middleware.
//!
//! Reads the bearer token from the configured header and the `Origin`
//! header, runs the [`Authenticator`], and stores the resulting
//! [`AuthOutcome`] in request extensions for handlers.

use crate::auth::authenticator::{AuthOutcome, AuthRequest, Authenticator};
use crate::auth::claims::Principal;
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Tenant-aware authenticator.
    pub authenticator: Arc<Authenticator>,

    /// Header carrying the bearer token.
    pub token_header: HeaderName,
}

/// Authentication middleware.
///
/// # Response
///
/// - Continues with `AuthOutcome::Anonymous` in extensions if no token was sent
/// - Continues with `AuthOutcome::Authenticated` if the token is valid
/// - Returns the `AuthError` response (401 or 503) otherwise
#[instrument(skip_all, name = "auth.middleware")]
pub async fn authenticate_request(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let auth_request = auth_request_from_headers(req.headers(), &state.token_header)?;

    let outcome = state.authenticator.authenticate(&auth_request).await?;

    req.extensions_mut().insert(outcome);

    Ok(next.run(req).await)
}

/// Build an [`AuthRequest`] from request headers.
///
/// # Errors
///
/// Returns `MalformedToken` if the token header is present but not visible
/// ASCII.
pub fn auth_request_from_headers(
    headers: &HeaderMap,
    token_header: &HeaderName,
) -> Result<AuthRequest, AuthError> {
    let token = match headers.get(token_header) {
        Some(value) => Some(value.to_str().map_err(|_| {
            tracing::debug!(target: "auth.middleware", "Token header is not valid ASCII");
            AuthError::MalformedToken
        })?),
        None => None,
    };

    // An unreadable origin is handled like a missing one
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok());

    Ok(AuthRequest::new(token, origin))
}

/// The authenticated principal, or `NoCredentials` for anonymous requests.
///
/// # Errors
///
/// Returns `AuthError::NoCredentials` for [`AuthOutcome::Anonymous`].
pub fn require_principal(outcome: &AuthOutcome) -> Result<&Principal, AuthError> {
    outcome.principal().ok_or_else(|| {
        tracing::debug!(target: "auth.middleware", "Anonymous request to protected route");
        AuthError::NoCredentials
    })
}

/// Extension trait for reading the authentication outcome from a request.
pub trait PrincipalExt {
    /// The principal, if the auth middleware authenticated this request.
    fn principal(&self) -> Option<&Principal>;
}

impl<B> PrincipalExt for axum::extract::Request<B> {
    fn principal(&self) -> Option<&Principal> {
        self.extensions()
            .get::<AuthOutcome>()
            .and_then(AuthOutcome::principal)
    }
}
