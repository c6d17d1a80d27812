//! Authentication module.
//!
//! Verifies tenant identity tokens against the signing keys of the tenant's
//! identity provider.
//!
//! # Components
//!
//! - `origin` - Request origin to tenant domain key
//! - `jwks` - Key-set cache for fetching and caching tenant signing keys
//! - `jwt` - RS256 token verification using cached keys
//! - `claims` - Verified claims, tenant claim checks and the principal
//! - `authenticator` - Per-request pipeline tying the above together

pub mod authenticator;
pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod origin;

pub use authenticator::{AuthOutcome, AuthRequest, Authenticator, TenantContext};
pub use claims::{Principal, TokenType, VerifiedClaims};
pub use jwks::{JwksCache, JwksCacheSettings, KeyResolver, PublicKey};
pub use jwt::TokenVerifier;
pub use origin::OriginPolicy;
