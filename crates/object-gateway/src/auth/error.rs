//! Token verification failures.
//!
//! The variants are only for logs, metrics and tests. At the HTTP boundary
//! everything except `MissingToken` collapses into one generic 401.

use thiserror::Error;

/// Why a bearer token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No bearer token in the Authorization header.
    #[error("Missing bearer token")]
    MissingToken,

    /// The token or its header could not be parsed.
    #[error("Malformed token")]
    MalformedToken,

    /// The token claims an algorithm outside the allow-list.
    #[error("Algorithm not allowed: {0}")]
    DisallowedAlgorithm(String),

    /// The signing key could not be obtained or is unusable.
    #[error("Signing key resolution failed: {0}")]
    KeyResolutionError(String),

    /// The signature does not match the resolved key.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Issuer, audience, expiry, issued-at or subject check failed.
    #[error("Invalid token claims: {0}")]
    InvalidClaims(String),
}

impl AuthError {
    /// Bounded label for metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::DisallowedAlgorithm(_) => "disallowed_algorithm",
            AuthError::KeyResolutionError(_) => "key_resolution",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::InvalidClaims(_) => "invalid_claims",
        }
    }
}
