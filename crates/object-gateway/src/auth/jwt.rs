//! Bearer token verification.
//!
//! Verifies identity-provider tokens using public keys from the provider's
//! JWKS document.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The header algorithm is checked against the allow-list BEFORE any key
//!   lookup, so `none` and HMAC tokens never reach the JWKS client
//! - Issuer must match exactly; audience must match `aud` or `client_id`
//! - Expiration is strict; issued-at and not-before get clock skew tolerance
//! - The subject must be usable as a single storage key segment

use super::identity::VerifiedIdentity;
use super::jwks::JwksClient;
use super::AuthError;
use crate::observability::metrics::record_token_validation;
use common::jwt::{decode_token_header, validate_iat_at, DEFAULT_CLOCK_SKEW};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, Validation};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Verification settings.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Exact `iss` value tokens must carry.
    pub issuer: String,

    /// Expected audience. Matched against `aud` (string or array) or the
    /// `client_id` claim carried by access tokens. `None` skips the check.
    pub audience: Option<String>,

    /// Accepted signing algorithms.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Tolerance applied to `nbf` and `iat`. Never to `exp`.
    pub clock_skew: Duration,
}

impl VerifierConfig {
    /// RS256-only settings for the given issuer.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: None,
            allowed_algorithms: vec![Algorithm::RS256],
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    /// Require the given audience.
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Override the clock skew tolerance.
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }
}

/// Token verifier using the identity provider's JWKS.
pub struct TokenVerifier {
    /// JWKS client for fetching public keys.
    jwks_client: Arc<JwksClient>,

    /// Verification settings.
    config: VerifierConfig,
}

impl TokenVerifier {
    /// Create a new token verifier.
    pub fn new(jwks_client: Arc<JwksClient>, config: VerifierConfig) -> Self {
        Self {
            jwks_client,
            config,
        }
    }

    /// Verify the value of an Authorization header.
    ///
    /// `None` (no header) and headers without a bearer token yield
    /// `AuthError::MissingToken`.
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` of the first failed check.
    pub async fn verify(&self, authorization: Option<&str>) -> Result<VerifiedIdentity, AuthError> {
        let result = match authorization.and_then(extract_bearer_token) {
            Some(token) => self.verify_token(token).await,
            None => {
                tracing::debug!(target: "og.auth.jwt", "No bearer token presented");
                Err(AuthError::MissingToken)
            }
        };

        match &result {
            Ok(_) => record_token_validation("success"),
            Err(e) => record_token_validation(e.metric_label()),
        }

        result
    }

    /// Verify a raw token.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and header decode
    /// 2. Algorithm allow-list
    /// 3. Key resolution by `kid`
    /// 4. Signature
    /// 5. `iss`, `exp`, `nbf`, `iat` and audience
    /// 6. Subject shape
    #[instrument(skip_all)]
    pub async fn verify_token(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let header = decode_token_header(token).map_err(|e| {
            tracing::debug!(target: "og.auth.jwt", error = ?e, "Token header decode failed");
            AuthError::MalformedToken
        })?;

        let algorithm = Algorithm::from_str(&header.alg)
            .ok()
            .filter(|alg| self.config.allowed_algorithms.contains(alg))
            .ok_or_else(|| {
                tracing::warn!(target: "og.auth.jwt", alg = %header.alg, "Token algorithm not allowed");
                AuthError::DisallowedAlgorithm(header.alg.clone())
            })?;

        let jwk = self.jwks_client.get_key(&header.kid).await?;
        let decoding_key = jwk.decoding_key()?;

        let mut validation = Validation::new(algorithm);
        validation.algorithms = self.config.allowed_algorithms.clone();
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;
        validation.validate_exp = true;
        // Checked below with the skew, which must not stretch `exp`
        validation.validate_nbf = false;
        // Checked below so that `client_id` can satisfy it
        validation.validate_aud = false;

        let token_data =
            decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|e| {
                tracing::debug!(target: "og.auth.jwt", error = %e, "Token verification failed");
                map_decode_error(e.kind(), &header.alg)
            })?;
        let claims = token_data.claims;

        validate_time_claims(&claims, self.config.clock_skew, chrono::Utc::now().timestamp())?;

        if let Some(expected) = &self.config.audience {
            if !audience_matches(&claims, expected) {
                tracing::debug!(target: "og.auth.jwt", "Token audience mismatch");
                return Err(AuthError::InvalidClaims("audience mismatch".to_string()));
            }
        }

        let identity = VerifiedIdentity::from_verified_claims(claims)?;

        tracing::debug!(target: "og.auth.jwt", "Token verified successfully");
        Ok(identity)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively. Returns `None` for other schemes
/// and empty tokens.
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// `exp` must be strictly after `now`. `iat` and `nbf` may lead `now` by
/// at most `clock_skew`.
fn validate_time_claims(
    claims: &Map<String, Value>,
    clock_skew: Duration,
    now: i64,
) -> Result<(), AuthError> {
    let exp = integer_claim(claims, "exp")?
        .ok_or_else(|| AuthError::InvalidClaims("missing exp claim".to_string()))?;
    if exp <= now {
        tracing::debug!(target: "og.auth.jwt", exp, now, "Token expired");
        return Err(AuthError::InvalidClaims("token expired".to_string()));
    }

    if let Some(iat) = integer_claim(claims, "iat")? {
        validate_iat_at(iat, clock_skew, now).map_err(|e| {
            tracing::debug!(target: "og.auth.jwt", error = ?e, "Token iat validation failed");
            AuthError::InvalidClaims("iat is in the future".to_string())
        })?;
    }

    if let Some(nbf) = integer_claim(claims, "nbf")? {
        let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
        if nbf > now.saturating_add(skew) {
            tracing::debug!(target: "og.auth.jwt", nbf, now, "Token not yet valid");
            return Err(AuthError::InvalidClaims("token not yet valid".to_string()));
        }
    }

    Ok(())
}

fn integer_claim(claims: &Map<String, Value>, name: &str) -> Result<Option<i64>, AuthError> {
    claims
        .get(name)
        .map(|value| {
            value
                .as_i64()
                .ok_or_else(|| AuthError::InvalidClaims(format!("{name} is not an integer")))
        })
        .transpose()
}

/// True if `aud` (string or array) or `client_id` equals `expected`.
fn audience_matches(claims: &Map<String, Value>, expected: &str) -> bool {
    let aud_matches = match claims.get("aud") {
        Some(Value::String(aud)) => aud == expected,
        Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(expected)),
        _ => false,
    };

    aud_matches || claims.get("client_id").and_then(Value::as_str) == Some(expected)
}

fn map_decode_error(kind: &ErrorKind, alg: &str) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidAlgorithm => AuthError::DisallowedAlgorithm(alg.to_string()),
        ErrorKind::InvalidKeyFormat | ErrorKind::InvalidRsaKey(_) => {
            AuthError::KeyResolutionError("unusable verification key".to_string())
        }
        ErrorKind::ExpiredSignature => AuthError::InvalidClaims("token expired".to_string()),
        ErrorKind::ImmatureSignature => AuthError::InvalidClaims("token not yet valid".to_string()),
        ErrorKind::InvalidIssuer => AuthError::InvalidClaims("issuer mismatch".to_string()),
        ErrorKind::InvalidAudience => AuthError::InvalidClaims("audience mismatch".to_string()),
        ErrorKind::InvalidSubject => AuthError::InvalidClaims("subject mismatch".to_string()),
        ErrorKind::MissingRequiredClaim(claim) => {
            AuthError::InvalidClaims(format!("missing {claim} claim"))
        }
        _ => AuthError::MalformedToken,
    }
}
