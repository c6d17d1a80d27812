//! # Tenant Auth Test Utilities
//!
//! Shared test utilities for the tenant authentication crates.
//!
//! This crate provides:
//! - Deterministic RS256 fixtures (fixed keys for reproducible tests)
//! - Test data builders (`TestTokenBuilder`)
//! - A mock identity provider serving JWKS documents (`MockIdentityProvider`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tenant_auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let idp = MockIdentityProvider::start("pool123").await;
//!     let key = TestSigningKey::primary("key-1");
//!     idp.publish_keys(&[key.clone()]).await;
//!
//!     let claims = TestTokenBuilder::new(&idp.issuer()).build();
//!     let token = key.sign(&claims).unwrap();
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_idp;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use mock_idp::*;
pub use token_builders::*;
