//! Repository layer.
//!
//! Database-backed implementations of the service's lookup contracts.

pub mod tenants;

pub use tenants::PgTenantDirectory;
