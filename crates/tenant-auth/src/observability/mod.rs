//! Observability for tenant authentication.

pub mod metrics;
