//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Raw bearer tokens
//! travel through the authentication pipeline wrapped in [`SecretString`] so
//! that deriving `Debug` on a request type, or passing it to `tracing`, can
//! never print the token.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct InboundCredentials {
//!     origin: Option<String>,
//!     token: SecretString,  // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let creds = InboundCredentials {
//!     origin: Some("https://app.tenant.example.com".to_string()),
//!     token: SecretString::from("eyJhbGciOiJSUzI1NiJ9.e30.c2ln"),
//! };
//!
//! println!("{:?}", creds);
//!
//! // Access requires an explicit call
//! let token: &str = creds.token.expose_secret();
//! ```
//!
//! Use `SecretString` for bearer tokens and database URLs carrying
//! credentials.

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("eyJhbGciOiJSUzI1NiJ9.e30.c2ln");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("eyJhbGci"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("token-value");
        assert_eq!(secret.expose_secret(), "token-value");
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct InboundCredentials {
            origin: String,
            token: SecretString,
        }

        let creds = InboundCredentials {
            origin: "https://app.tenant.example.com".to_string(),
            token: SecretString::from("super-secret-token"),
        };

        let debug_str = format!("{creds:?}");

        assert!(debug_str.contains("app.tenant.example.com"));
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("super-secret-token"));
    }

    #[test]
    fn test_clone_works() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}
