//! Authentication module for Object Gateway.
//!
//! Verifies identity-provider tokens against the provider's JWKS endpoint.
//!
//! # Components
//!
//! - `jwks` - JWKS client fetching and caching RSA public keys per key ID
//! - `jwt` - Token verification (algorithm allow-list, signature, claims)
//! - `identity` - The verified identity handed to request handlers
//! - `error` - Verification failure taxonomy

pub mod error;
pub mod identity;
pub mod jwks;
pub mod jwt;

pub use error::AuthError;
pub use identity::VerifiedIdentity;
pub use jwks::JwksClient;
pub use jwt::{TokenVerifier, VerifierConfig};
