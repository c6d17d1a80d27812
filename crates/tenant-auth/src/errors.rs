//! Tenant authentication error types.
//!
//! Every rejection the pipeline can produce is one variant of [`AuthError`].
//! Each variant carries a stable reason code for logs and metrics, and maps to
//! an HTTP status via the `IntoResponse` impl. Messages returned to clients are
//! intentionally generic: no token contents, key material or backend error
//! text ever leaves the service.

use crate::auth::claims::ValidationError;
use crate::auth::jwks::FetchError;
use crate::auth::jwt::VerificationError;
use crate::directory::DirectoryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Generic client message for every token-level failure.
const INVALID_TOKEN_MESSAGE: &str = "The identity token is invalid or expired";

/// Authentication rejection.
///
/// Maps to HTTP status codes:
/// - BackendUnavailable: 503 Service Unavailable
/// - everything else: 401 Unauthorized
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthError {
    /// A protected route was called without credentials.
    ///
    /// Never produced by the authenticator itself: a request without a token
    /// is an anonymous outcome there, not an error.
    #[error("Authentication required")]
    NoCredentials,

    #[error("Unknown tenant")]
    UnknownTenant,

    #[error("Signing key unavailable")]
    KeyUnavailable,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("Token issuer does not match tenant")]
    IssuerMismatch,

    #[error("Token is not an identity token")]
    WrongTokenType,

    #[error("Token has no usable username claim")]
    MissingUsername,

    #[error("Authentication backend unavailable")]
    BackendUnavailable,
}

impl AuthError {
    /// Stable reason code, safe for logs, metrics labels and response bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::NoCredentials => "NO_CREDENTIALS",
            AuthError::UnknownTenant => "UNKNOWN_TENANT",
            AuthError::KeyUnavailable => "KEY_UNAVAILABLE",
            AuthError::MalformedToken => "MALFORMED",
            AuthError::BadSignature => "BAD_SIGNATURE",
            AuthError::Expired => "EXPIRED",
            AuthError::NotYetValid => "NOT_YET_VALID",
            AuthError::IssuerMismatch => "ISSUER_MISMATCH",
            AuthError::WrongTokenType => "WRONG_TOKEN_TYPE",
            AuthError::MissingUsername => "MISSING_USERNAME",
            AuthError::BackendUnavailable => "BACKEND_UNAVAILABLE",
        }
    }

    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::BackendUnavailable => 503,
            _ => 401,
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            AuthError::NoCredentials => "Authentication required",
            AuthError::UnknownTenant => "Unknown tenant",
            AuthError::BackendUnavailable => "Service temporarily unavailable",
            _ => INVALID_TOKEN_MESSAGE,
        }
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound => AuthError::UnknownTenant,
            DirectoryError::Unavailable => AuthError::BackendUnavailable,
        }
    }
}

impl From<VerificationError> for AuthError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Malformed => AuthError::MalformedToken,
            VerificationError::KeyUnavailable(FetchError::KeyNotFound) => AuthError::KeyUnavailable,
            VerificationError::KeyUnavailable(
                FetchError::Unreachable | FetchError::InvalidDocument,
            ) => AuthError::BackendUnavailable,
            VerificationError::BadSignature => AuthError::BadSignature,
            VerificationError::Expired => AuthError::Expired,
            VerificationError::NotYetValid => AuthError::NotYetValid,
        }
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::IssuerMismatch => AuthError::IssuerMismatch,
            ValidationError::WrongTokenType => AuthError::WrongTokenType,
            ValidationError::MissingUsername => AuthError::MissingUsername,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self.status_code() {
            503 => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        };

        if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(target: "auth.middleware", reason = self.reason(), "Authentication backend unavailable");
        }

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.reason(),
                message: self.client_message(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // RFC 6750: no error code when the request carried no token at all
        if status == StatusCode::UNAUTHORIZED {
            let challenge = match self {
                AuthError::NoCredentials => "Bearer realm=\"tenant-api\"",
                _ => "Bearer realm=\"tenant-api\", error=\"invalid_token\"",
            };
            if let Ok(header_value) = challenge.parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
