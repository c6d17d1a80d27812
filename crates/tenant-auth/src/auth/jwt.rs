//! Token verification for tenant identity tokens.
//!
//! Verifies a raw bearer token against the signing keys published at a
//! tenant's key-set location.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted; the header algorithm is checked before any key
//!   lookup, so `none` and HMAC confusion never reach the key set
//! - `exp` and `nbf` are validated with clock skew tolerance
//! - Failures are reported as reason variants; details stay in debug logs

use crate::auth::claims::VerifiedClaims;
use crate::auth::jwks::{FetchError, KeyResolver, PublicKey};
use common::jwt::{extract_header, strip_bearer_prefix};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use url::Url;

/// The only signature algorithm accepted.
pub const ACCEPTED_ALGORITHM: Algorithm = Algorithm::RS256;

const ACCEPTED_ALGORITHM_NAME: &str = "RS256";

/// Token-level verification failure.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("token is malformed")]
    Malformed,

    #[error("signing key unavailable: {0}")]
    KeyUnavailable(FetchError),

    #[error("token signature does not verify")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,
}

/// Stateless RS256 token verifier.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    /// Leeway applied to `exp` and `nbf`, in seconds.
    leeway_seconds: u64,
}

impl TokenVerifier {
    /// Create a verifier tolerating `clock_skew` on `exp`/`nbf`.
    pub fn new(clock_skew: Duration) -> Self {
        Self {
            leeway_seconds: clock_skew.as_secs(),
        }
    }

    /// Verify `raw_token` with keys from `key_set_location`.
    ///
    /// # Security Checks
    ///
    /// 1. Strip an optional "Bearer " prefix
    /// 2. Size check and envelope parse; `alg` must be RS256, `kid` present
    /// 3. Resolve the signing key (at most one key set refresh)
    /// 4. Verify the RS256 signature
    /// 5. Validate `exp`/`nbf` when present
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a [`VerificationError`].
    #[instrument(skip_all, name = "auth.jwt.verify")]
    pub async fn verify(
        &self,
        raw_token: &str,
        key_resolver: &dyn KeyResolver,
        key_set_location: &Url,
    ) -> Result<VerifiedClaims, VerificationError> {
        let token = strip_bearer_prefix(raw_token);

        let header = extract_header(token).map_err(|e| {
            tracing::debug!(target: "auth.jwt", error = ?e, "Token header extraction failed");
            VerificationError::Malformed
        })?;

        if header.alg != ACCEPTED_ALGORITHM_NAME {
            tracing::debug!(target: "auth.jwt", alg = %header.alg, "Rejected token algorithm");
            return Err(VerificationError::Malformed);
        }

        let key = key_resolver
            .get_key(key_set_location, &header.kid)
            .await
            .map_err(|e| {
                tracing::debug!(target: "auth.jwt", error = %e, "Signing key unavailable");
                VerificationError::KeyUnavailable(e)
            })?;

        let fields = verify_token(token, &key, self.leeway_seconds)?;

        tracing::debug!(target: "auth.jwt", "Token verified successfully");
        Ok(VerifiedClaims::from_verified_payload(fields))
    }
}

/// Verify the RS256 signature and validity window, returning the payload.
fn verify_token(
    token: &str,
    key: &PublicKey,
    leeway_seconds: u64,
) -> Result<Map<String, Value>, VerificationError> {
    let mut validation = Validation::new(ACCEPTED_ALGORITHM);
    validation.leeway = leeway_seconds;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // Identity tokens carry the app client id as audience; not checked here
    validation.validate_aud = false;
    // exp is optional for this token profile
    validation.required_spec_claims = HashSet::new();

    decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(target: "auth.jwt", error = %e, "Token verification failed");
            classify(e.kind())
        })
}

fn classify(kind: &ErrorKind) -> VerificationError {
    match kind {
        ErrorKind::ExpiredSignature => VerificationError::Expired,
        ErrorKind::ImmatureSignature => VerificationError::NotYetValid,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::MissingAlgorithm => VerificationError::Malformed,
        // Signature mismatch and key/crypto failures alike
        _ => VerificationError::BadSignature,
    }
}
