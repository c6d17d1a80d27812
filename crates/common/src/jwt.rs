//! JWT envelope utilities shared by the tenant authentication crates.
//!
//! This module provides the pre-verification helpers used before any key
//! lookup or signature check happens:
//! - Size limits for DoS prevention
//! - Clock skew constants for `exp`/`nbf` leeway
//! - Bearer prefix stripping
//! - Header extraction (`alg` and `kid`) without verifying the signature
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned here is trusted: the header only selects which key the
//!   verifier asks for, the token MUST still be verified with that key
//! - Error messages are generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{extract_header, strip_bearer_prefix};
//!
//! let token = strip_bearer_prefix(raw_header_value);
//! let header = extract_header(token)?;
//! let key = key_cache.get_key(&location, &header.kid).await?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// # Rationale
///
/// - Identity tokens from hosted user pools are typically 1-2KB
/// - RS256 signatures alone are ~342 bytes base64url encoded
/// - 8KB leaves room for custom attributes while bounding decode cost
///
/// Per OWASP API Security Top 10 - API4:2023 (Unrestricted Resource Consumption)
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Prefix accepted in front of the raw token value (case-sensitive).
pub const BEARER_PREFIX: &str = "Bearer ";

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Applied as leeway when checking `exp` and `nbf`.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration that would keep expired tokens usable for long.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while reading the JWT envelope.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The identity token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The identity token is invalid or expired")]
    MalformedToken,

    /// Token header has no `alg` field.
    #[error("The identity token is invalid or expired")]
    MissingAlg,

    /// Token is missing required `kid` header.
    #[error("The identity token is invalid or expired")]
    MissingKid,
}

// =============================================================================
// Header Types
// =============================================================================

/// The two header fields the verifier needs before it can pick a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Declared signing algorithm, exactly as it appears in the header.
    pub alg: String,

    /// Key identifier used to select a key from the issuer's key set.
    pub kid: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<serde_json::Value>,
    #[serde(default)]
    kid: Option<serde_json::Value>,
}

// =============================================================================
// Functions
// =============================================================================

/// Strip an optional `"Bearer "` prefix from a raw token value.
///
/// The match is exact and case-sensitive. A value without the prefix is
/// returned unchanged (minus surrounding whitespace), it is not an error.
///
/// # Example
///
/// ```rust
/// use common::jwt::strip_bearer_prefix;
///
/// assert_eq!(strip_bearer_prefix("Bearer abc.def.ghi"), "abc.def.ghi");
/// assert_eq!(strip_bearer_prefix("abc.def.ghi"), "abc.def.ghi");
/// assert_eq!(strip_bearer_prefix("bearer abc"), "bearer abc");
/// ```
#[must_use]
pub fn strip_bearer_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix(BEARER_PREFIX)
        .map_or(trimmed, str::trim_start)
}

/// Extract `alg` and `kid` from a JWT header without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The `kid` value should only be used for key lookup in a trusted key set
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON
/// - `MissingAlg` - Header has no string `alg`
/// - `MissingKid` - Header missing `kid`, `kid` not a string, or empty
pub fn extract_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = header
        .alg
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingAlg)?;

    // Reject empty kid values; they can never name a published key
    let kid = header
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(TokenHeader { alg, kid })
}

// =============================================================================
// Tests
// =============================================================================
