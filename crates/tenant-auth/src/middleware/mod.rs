//! HTTP middleware.

pub mod auth;

pub use auth::{authenticate_request, AuthState, PrincipalExt};
