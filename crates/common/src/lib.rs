//! Common utilities shared across the tenant authentication crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT envelope utilities (size limits, bearer prefix, header)
pub mod jwt;
