//! Verified identity.
//!
//! Produced only by [`TokenVerifier`](super::TokenVerifier) after signature
//! and claim checks pass. The subject is redacted in Debug output.

use super::AuthError;
use serde_json::{Map, Value};
use std::fmt;

/// The authenticated end user behind a request.
///
/// Request-scoped: the auth middleware stores it in request extensions and
/// handlers read it with `Extension<VerifiedIdentity>`.
#[derive(Clone)]
pub struct VerifiedIdentity {
    subject: String,
    raw_claims: Map<String, Value>,
}

impl VerifiedIdentity {
    /// Build an identity from claims whose signature has already been verified.
    ///
    /// The subject becomes a storage key segment, so it must be non-empty and
    /// must not contain `/` or be a dot segment.
    pub(crate) fn from_verified_claims(raw_claims: Map<String, Value>) -> Result<Self, AuthError> {
        let subject = raw_claims
            .get("sub")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidClaims("missing sub claim".to_string()))?;

        if subject.is_empty() || subject.contains('/') || subject == "." || subject == ".." {
            return Err(AuthError::InvalidClaims(
                "sub claim is not a usable identifier".to_string(),
            ));
        }

        Ok(Self {
            subject: subject.to_string(),
            raw_claims,
        })
    }

    /// Subject (`sub` claim) of the token.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// All claims carried by the token.
    pub fn raw_claims(&self) -> &Map<String, Value> {
        &self.raw_claims
    }

    /// A string-valued claim, if present.
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.raw_claims.get(name).and_then(Value::as_str)
    }
}

/// Custom Debug implementation that redacts the subject.
impl fmt::Debug for VerifiedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedIdentity")
            .field("subject", &"[REDACTED]")
            .field("claims", &self.raw_claims.keys().collect::<Vec<_>>())
            .finish()
    }
}
