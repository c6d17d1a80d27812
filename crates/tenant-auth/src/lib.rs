//! Tenant Auth Service Library
//!
//! Multi-tenant bearer-token authentication. Each request is attributed to
//! a tenant from its `Origin` header, and its identity token is verified
//! against that tenant's identity provider:
//!
//! - Origin to tenant domain key resolution
//! - Tenant directory lookup (issuer and key set location)
//! - JWKS fetching with a shared, coalescing key cache
//! - RS256 signature and time-window verification
//! - Issuer, token type and username claim validation
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/authenticator.rs
//!                                          |-> auth/origin.rs
//!                                          |-> directory (repositories/tenants.rs)
//!                                          |-> auth/jwt.rs -> auth/jwks.rs
//!                                          '-> auth/claims.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Authentication pipeline and its stages
//! - `config` - Service configuration from environment
//! - `directory` - Tenant directory contract and in-memory implementation
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication middleware
//! - `models` - Response models
//! - `observability` - Prometheus metrics
//! - `repositories` - Postgres tenant directory
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod directory;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
