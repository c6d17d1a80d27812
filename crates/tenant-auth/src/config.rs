//! Tenant authentication configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use crate::auth::jwks::{JwksCacheSettings, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use crate::auth::origin::{OriginPolicy, DEFAULT_DEV_ORIGIN};
use axum::http::HeaderName;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default header carrying the bearer token.
pub const DEFAULT_TOKEN_HEADER: &str = "authorization";

/// Default claim holding the principal's username.
pub const DEFAULT_USERNAME_FIELD: &str = "email";

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default key set cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Maximum key set cache TTL in seconds (1 day).
pub const MAX_JWKS_CACHE_TTL_SECONDS: u64 = 86_400;

/// Settings of the authentication pipeline itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Request header carrying the token (default: "Authorization").
    pub token_header: HeaderName,

    /// Claim used as the principal's username (default: "email").
    pub username_field: String,

    /// Tenant used for development origins and origins without a tenant.
    pub default_domain: Option<String>,

    /// Origins mapped to the default domain (default: "http://localhost:4200").
    pub dev_origins: Vec<String>,

    /// Public suffixes spanning several labels, e.g. "co.uk".
    pub multi_label_suffixes: Vec<String>,

    /// Key set cache TTL and HTTP timeouts.
    pub jwks: JwksCacheSettings,

    /// Leeway applied to `exp`/`nbf`.
    pub jwt_clock_skew: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_header: HeaderName::from_static(DEFAULT_TOKEN_HEADER),
            username_field: DEFAULT_USERNAME_FIELD.to_string(),
            default_domain: None,
            dev_origins: vec![DEFAULT_DEV_ORIGIN.to_string()],
            multi_label_suffixes: Vec::new(),
            jwks: JwksCacheSettings::default(),
            jwt_clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

/// Service configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Database URL is redacted in Debug output to prevent credential leakage.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Authentication pipeline settings.
    pub auth: AuthConfig,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("auth", &self.auth)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid token header configuration: {0}")]
    InvalidTokenHeader(String),

    #[error("Invalid username field configuration: {0}")]
    InvalidUsernameField(String),

    #[error("Invalid key set cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid key set timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),
}

impl AuthConfig {
    /// Load authentication settings from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let token_header = match vars.get("TENANT_AUTH_TOKEN_HEADER") {
            Some(value) => HeaderName::from_bytes(value.trim().as_bytes()).map_err(|e| {
                ConfigError::InvalidTokenHeader(format!(
                    "TENANT_AUTH_TOKEN_HEADER must be a valid header name, got '{value}': {e}"
                ))
            })?,
            None => HeaderName::from_static(DEFAULT_TOKEN_HEADER),
        };

        let username_field = match vars.get("TENANT_AUTH_USERNAME_FIELD") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::InvalidUsernameField(
                    "TENANT_AUTH_USERNAME_FIELD must not be empty".to_string(),
                ));
            }
            Some(value) => value.trim().to_string(),
            None => DEFAULT_USERNAME_FIELD.to_string(),
        };

        let default_domain = vars
            .get("TENANT_AUTH_DEFAULT_DOMAIN")
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty());

        let dev_origins = vars
            .get("TENANT_AUTH_DEV_ORIGINS")
            .map_or_else(|| vec![DEFAULT_DEV_ORIGIN.to_string()], |v| parse_list(v));

        let multi_label_suffixes = vars
            .get("TENANT_AUTH_MULTI_LABEL_SUFFIXES")
            .map(|v| parse_list(v))
            .unwrap_or_default();

        let cache_ttl_seconds = parse_bounded(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
            MAX_JWKS_CACHE_TTL_SECONDS,
            ConfigError::InvalidCacheTtl,
        )?;

        let connect_timeout_ms = parse_bounded(
            vars,
            "JWKS_CONNECT_TIMEOUT_MS",
            duration_millis(DEFAULT_CONNECT_TIMEOUT),
            u64::from(u32::MAX),
            ConfigError::InvalidTimeout,
        )?;

        let read_timeout_ms = parse_bounded(
            vars,
            "JWKS_READ_TIMEOUT_MS",
            duration_millis(DEFAULT_READ_TIMEOUT),
            u64::from(u32::MAX),
            ConfigError::InvalidTimeout,
        )?;

        let jwt_clock_skew_seconds = parse_bounded(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs(),
            MAX_CLOCK_SKEW.as_secs(),
            ConfigError::InvalidJwtClockSkew,
        )?;

        Ok(Self {
            token_header,
            username_field,
            default_domain,
            dev_origins,
            multi_label_suffixes,
            jwks: JwksCacheSettings {
                cache_ttl: Duration::from_secs(cache_ttl_seconds),
                connect_timeout: Duration::from_millis(connect_timeout_ms),
                read_timeout: Duration::from_millis(read_timeout_ms),
            },
            jwt_clock_skew: Duration::from_secs(jwt_clock_skew_seconds),
        })
    }

    /// Origin policy described by these settings.
    pub fn origin_policy(&self) -> OriginPolicy {
        OriginPolicy::new(self.default_domain.clone())
            .with_dev_origins(self.dev_origins.clone())
            .with_multi_label_suffixes(self.multi_label_suffixes.clone())
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        Ok(Config {
            database_url,
            bind_address,
            auth: AuthConfig::from_vars(vars)?,
        })
    }
}

/// Parse a positive integer variable no larger than `max`.
fn parse_bounded(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    max: u64,
    error: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.trim().parse().map_err(|e| {
        error(format!(
            "{name} must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;

    if value == 0 {
        return Err(error(format!("{name} must be greater than 0")));
    }

    if value > max {
        return Err(error(format!(
            "{name} must not exceed {max}, got {value}"
        )));
    }

    Ok(value)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
