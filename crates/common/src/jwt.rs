//! Token inspection that happens before any signature check.
//!
//! The verifier needs two things from an unverified token: the key ID to
//! look up and the algorithm it claims. This module extracts them under a
//! hard size cap, and also holds the shared clock-skew bounds plus the
//! issued-at check applied once claims are trusted.
//!
//! Nothing returned from [`decode_token_header`] is trusted. The `kid` may
//! only be used as a lookup key into a trusted key set, and `alg` only to
//! reject tokens early.
//!
//! ```rust,ignore
//! use common::jwt::{decode_token_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let header = decode_token_header(token)?;
//! let key = jwks_client.get_key(&header.kid).await?;
//! // ...verify signature, then:
//! validate_iat(iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Largest token accepted for inspection, in bytes.
///
/// Cognito ID and access tokens are well under 2 KiB. Longer input is
/// refused before base64 decoding.
pub const MAX_JWT_SIZE_BYTES: usize = 8 * 1024;

/// Default tolerance for clock drift between us and the token issuer.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Upper bound on configurable clock drift tolerance.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(10 * 60);

/// Reasons a token is refused before verification.
///
/// All variants share one outward message; the precise reason is only
/// logged at debug level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenShapeError {
    #[error("The access token is invalid or expired")]
    Oversized,

    #[error("The access token is invalid or expired")]
    NotAJwt,

    #[error("The access token is invalid or expired")]
    NoKeyId,

    #[error("The access token is invalid or expired")]
    NoAlgorithm,

    #[error("The access token is invalid or expired")]
    IssuedInFuture,
}

/// Untrusted header fields used to pick and constrain the verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    pub kid: String,
    /// Raw `alg`, so values with no `jsonwebtoken::Algorithm` variant
    /// (`none`) can still be seen and refused.
    pub alg: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    kid: Option<Value>,
    #[serde(default)]
    alg: Option<Value>,
}

/// Read `kid` and `alg` from a compact JWT without verifying it.
///
/// # Errors
///
/// - `Oversized` above [`MAX_JWT_SIZE_BYTES`], checked first
/// - `NotAJwt` unless there are exactly three segments and the first is
///   base64url JSON
/// - `NoKeyId` / `NoAlgorithm` when the field is absent, empty or not a string
pub fn decode_token_header(token: &str) -> Result<TokenHeader, TokenShapeError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(target: "common.jwt", len = token.len(), "Refusing oversized token");
        return Err(TokenShapeError::Oversized);
    }

    let mut segments = token.split('.');
    let (Some(encoded_header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        tracing::debug!(target: "common.jwt", "Refusing token: not three segments");
        return Err(TokenShapeError::NotAJwt);
    };

    let raw: RawHeader = URL_SAFE_NO_PAD
        .decode(encoded_header)
        .map_err(|e| e.to_string())
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
        .map_err(|reason| {
            tracing::debug!(target: "common.jwt", %reason, "Refusing token: unreadable header");
            TokenShapeError::NotAJwt
        })?;

    Ok(TokenHeader {
        kid: non_empty_str(raw.kid).ok_or(TokenShapeError::NoKeyId)?,
        alg: non_empty_str(raw.alg).ok_or(TokenShapeError::NoAlgorithm)?,
    })
}

fn non_empty_str(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Refuse an `iat` more than `clock_skew` ahead of now.
///
/// # Errors
///
/// `IssuedInFuture` when `iat > now + clock_skew`.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), TokenShapeError> {
    validate_iat_at(iat, clock_skew, chrono::Utc::now().timestamp())
}

/// [`validate_iat`] against a caller-supplied `now` (Unix seconds).
///
/// # Errors
///
/// `IssuedInFuture` when `iat > now + clock_skew`.
pub fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), TokenShapeError> {
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let latest = now.saturating_add(skew);

    if iat > latest {
        tracing::debug!(target: "common.jwt", iat, now, latest, "Refusing token: iat in the future");
        return Err(TokenShapeError::IssuedInFuture);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn with_header(header: &str) -> String {
        format!("{}.e30.sig", URL_SAFE_NO_PAD.encode(header))
    }

    #[test]
    fn test_reads_kid_and_alg() {
        let token = with_header(r#"{"alg":"RS256","typ":"JWT","kid":"abc123"}"#);

        let header = decode_token_header(&token).unwrap();

        assert_eq!(
            header,
            TokenHeader {
                kid: "abc123".to_string(),
                alg: "RS256".to_string()
            }
        );
    }

    #[test]
    fn test_none_algorithm_is_surfaced() {
        let token = with_header(r#"{"alg":"none","kid":"abc123"}"#);
        assert_eq!(decode_token_header(&token).unwrap().alg, "none");
    }

    #[test]
    fn test_kid_must_be_non_empty_string() {
        for header in [
            r#"{"alg":"RS256"}"#,
            r#"{"alg":"RS256","kid":""}"#,
            r#"{"alg":"RS256","kid":7}"#,
            r#"{"alg":"RS256","kid":null}"#,
        ] {
            assert_eq!(
                decode_token_header(&with_header(header)),
                Err(TokenShapeError::NoKeyId),
                "{header}"
            );
        }
    }

    #[test]
    fn test_alg_must_be_non_empty_string() {
        for header in [r#"{"kid":"k"}"#, r#"{"kid":"k","alg":["RS256"]}"#] {
            assert_eq!(
                decode_token_header(&with_header(header)),
                Err(TokenShapeError::NoAlgorithm),
                "{header}"
            );
        }
    }

    #[test]
    fn test_structure_errors() {
        for token in ["", "abc", "a.b", "a.b.c.d", "%%%.e30.sig"] {
            assert_eq!(
                decode_token_header(token),
                Err(TokenShapeError::NotAJwt),
                "{token}"
            );
        }
        assert_eq!(
            decode_token_header(&with_header("[1,2")),
            Err(TokenShapeError::NotAJwt)
        );
    }

    #[test]
    fn test_size_cap_is_inclusive() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"k"}"#);
        let filler = MAX_JWT_SIZE_BYTES - header.len() - 3;
        let at_cap = format!("{header}.{}.x", "p".repeat(filler));
        assert_eq!(at_cap.len(), MAX_JWT_SIZE_BYTES);
        assert!(decode_token_header(&at_cap).is_ok());

        let over_cap = format!("{at_cap}x");
        assert_eq!(
            decode_token_header(&over_cap),
            Err(TokenShapeError::Oversized)
        );
    }

    #[test]
    fn test_skew_bounds() {
        assert!(DEFAULT_CLOCK_SKEW <= MAX_CLOCK_SKEW);
        assert_eq!(MAX_CLOCK_SKEW.as_secs(), 600);
    }

    #[test]
    fn test_iat_boundary() {
        let now = 1_700_000_000;

        assert!(validate_iat_at(now - 86_400, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert!(validate_iat_at(now + 60, DEFAULT_CLOCK_SKEW, now).is_ok());
        assert_eq!(
            validate_iat_at(now + 61, DEFAULT_CLOCK_SKEW, now),
            Err(TokenShapeError::IssuedInFuture)
        );
    }

    #[test]
    fn test_iat_against_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now + 3600, DEFAULT_CLOCK_SKEW).is_err());
    }
}
