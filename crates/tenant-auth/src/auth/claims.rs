//! Verified claims and principal construction.
//!
//! [`VerifiedClaims`] can only be built inside this crate, by the token
//! verifier, after the signature has been checked. [`validate`] turns them into
//! a [`Principal`] once the tenant-specific checks pass.
//!
//! Usernames and claim values are redacted in Debug output.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Role granted to every authenticated principal.
pub const ADMIN_ROLE: &str = "ADMIN";

const TOKEN_USE_CLAIM: &str = "token_use";
const ISSUER_CLAIM: &str = "iss";

/// Kind of token, from the `token_use` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Id,
    Access,
    Other,
}

impl TokenType {
    fn from_token_use(token_use: Option<&str>) -> Self {
        match token_use {
            Some("id") => TokenType::Id,
            Some("access") => TokenType::Access,
            _ => TokenType::Other,
        }
    }
}

/// Payload of a token whose signature and validity window were verified.
#[derive(Clone)]
pub struct VerifiedClaims {
    issuer: Option<String>,
    token_type: TokenType,
    fields: Map<String, Value>,
}

impl VerifiedClaims {
    /// Wrap a payload that has passed cryptographic verification.
    pub(crate) fn from_verified_payload(fields: Map<String, Value>) -> Self {
        let issuer = fields
            .get(ISSUER_CLAIM)
            .and_then(Value::as_str)
            .map(str::to_string);
        let token_type =
            TokenType::from_token_use(fields.get(TOKEN_USE_CLAIM).and_then(Value::as_str));

        Self {
            issuer,
            token_type,
            fields,
        }
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Only claim names are shown; values may carry personal data.
impl fmt::Debug for VerifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedClaims")
            .field("issuer", &self.issuer)
            .field("token_type", &self.token_type)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Authenticated identity handed to request handlers.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    username: String,
    roles: BTreeSet<String>,
}

impl Principal {
    pub(crate) fn admin(username: &str) -> Self {
        Self {
            username: username.to_string(),
            roles: BTreeSet::from([ADMIN_ROLE.to_string()]),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("username", &"[REDACTED]")
            .field("roles", &self.roles)
            .finish()
    }
}

/// Tenant-level claim check failure.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("token issuer does not match tenant")]
    IssuerMismatch,

    #[error("token is not an identity token")]
    WrongTokenType,

    #[error("username claim missing or not a string")]
    MissingUsername,
}

/// Check verified claims against the tenant and build the principal.
///
/// # Errors
///
/// - `IssuerMismatch` unless `iss` equals `expected_issuer` exactly
/// - `WrongTokenType` unless `token_use` is "id"
/// - `MissingUsername` unless `username_field` holds a non-empty string
pub fn validate(
    claims: &VerifiedClaims,
    expected_issuer: &str,
    username_field: &str,
) -> Result<Principal, ValidationError> {
    if claims.issuer() != Some(expected_issuer) {
        tracing::debug!(target: "auth.claims", "Token issuer does not match tenant");
        return Err(ValidationError::IssuerMismatch);
    }

    if claims.token_type() != TokenType::Id {
        tracing::debug!(target: "auth.claims", token_type = ?claims.token_type(), "Rejected non-identity token");
        return Err(ValidationError::WrongTokenType);
    }

    let username = claims
        .field(username_field)
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "auth.claims", username_field, "Username claim missing");
            ValidationError::MissingUsername
        })?;

    Ok(Principal::admin(username))
}
