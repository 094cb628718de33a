//! JWKS client for fetching and caching the identity provider's signing keys.
//!
//! Keys are fetched from the provider's `/.well-known/jwks.json` document and
//! cached per key ID for the life of the process. A key ID that is not cached
//! triggers exactly one fetch; if the key is still absent afterwards the
//! lookup fails.
//!
//! # Security
//!
//! - Every fetch is bounded by the configured timeout
//! - Only RSA signing keys are usable (`kty` = "RSA", `use` absent or "sig")
//! - HTTPS should be used in production (enforced by deployment config)

use super::AuthError;
use crate::observability::metrics::record_jwks_fetch;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::instrument;

/// Default upper bound on a single JWKS fetch.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON Web Key from the JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for usable keys).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm hint (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use ("sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

impl Jwk {
    /// Build an RSA verification key from this JWK.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyResolutionError` if the key is not an RSA
    /// signing key or its components do not decode.
    pub fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        if self.kty != "RSA" {
            tracing::warn!(target: "og.auth.jwks", kid = %self.kid, kty = %self.kty, "Unexpected JWK key type");
            return Err(AuthError::KeyResolutionError(format!(
                "unsupported key type {}",
                self.kty
            )));
        }

        if let Some(key_use) = &self.key_use {
            if key_use != "sig" {
                tracing::warn!(target: "og.auth.jwks", kid = %self.kid, key_use = %key_use, "JWK is not a signing key");
                return Err(AuthError::KeyResolutionError(
                    "key is not a signing key".to_string(),
                ));
            }
        }

        if let Some(alg) = &self.alg {
            if alg != "RS256" {
                tracing::warn!(target: "og.auth.jwks", kid = %self.kid, alg = %alg, "Unexpected JWK algorithm");
                return Err(AuthError::KeyResolutionError(format!(
                    "unsupported key algorithm {alg}"
                )));
            }
        }

        let (n, e) = match (&self.n, &self.e) {
            (Some(n), Some(e)) => (n, e),
            _ => {
                tracing::error!(target: "og.auth.jwks", kid = %self.kid, "JWK missing RSA components");
                return Err(AuthError::KeyResolutionError(
                    "key is missing RSA components".to_string(),
                ));
            }
        };

        DecodingKey::from_rsa_components(n, e).map_err(|e| {
            tracing::error!(target: "og.auth.jwks", kid = %self.kid, error = %e, "Invalid RSA key encoding");
            AuthError::KeyResolutionError("invalid RSA key encoding".to_string())
        })
    }
}

/// JWKS document served by the identity provider.
///
/// Entries stay raw so that one key we cannot read (no `kid`, unknown shape)
/// does not discard the rest of the set.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// Published keys, as served.
    pub keys: Vec<serde_json::Value>,
}

impl JwksResponse {
    /// Keys that parse as a [`Jwk`]; the rest are logged and skipped.
    pub fn usable_keys(self) -> Vec<Jwk> {
        self.keys
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Jwk>(entry) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    tracing::warn!(target: "og.auth.jwks", error = %e, "Skipping unreadable JWK");
                    None
                }
            })
            .collect()
    }
}

/// JWKS client for fetching and caching public keys.
///
/// Thread-safe; shared by every request through the token verifier.
pub struct JwksClient {
    /// URL to the JWKS document.
    jwks_url: String,

    /// HTTP client for fetching JWKS, with the fetch timeout applied.
    http_client: reqwest::Client,

    /// Cached keys by key ID.
    cache: Arc<RwLock<HashMap<String, Jwk>>>,

    /// Upper bound on a single fetch.
    fetch_timeout: Duration,
}

impl JwksClient {
    /// Create a new JWKS client with the default fetch timeout.
    pub fn new(jwks_url: String) -> Self {
        Self::with_timeout(jwks_url, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a new JWKS client with a custom fetch timeout.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL to the provider's JWKS document
    /// * `fetch_timeout` - Upper bound on a single fetch
    pub fn with_timeout(jwks_url: String, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "og.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            fetch_timeout,
        }
    }

    /// Get a JWK by key ID.
    ///
    /// Returns the cached key, or fetches the JWKS document once and retries.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyResolutionError` if the document cannot be
    /// fetched within the timeout or does not contain the key ID.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(key) = cache.get(kid) {
                tracing::debug!(target: "og.auth.jwks", kid = %kid, "JWKS cache hit");
                return Ok(key.clone());
            }
        }

        self.refresh_cache().await?;

        let cache = self.cache.read().await;
        if let Some(key) = cache.get(kid) {
            return Ok(key.clone());
        }

        tracing::warn!(target: "og.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(AuthError::KeyResolutionError(
            "signing key not published by the identity provider".to_string(),
        ))
    }

    /// Fetch the JWKS document and merge its keys into the cache.
    ///
    /// Keys already cached are kept even if the provider stopped publishing
    /// them; rotation only ever adds key IDs.
    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), AuthError> {
        tracing::debug!(target: "og.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    record_jwks_fetch("timeout");
                    tracing::error!(
                        target: "og.auth.jwks",
                        timeout_ms = self.fetch_timeout.as_millis() as u64,
                        "JWKS fetch timed out"
                    );
                    AuthError::KeyResolutionError("JWKS fetch timed out".to_string())
                } else {
                    record_jwks_fetch("error");
                    tracing::error!(target: "og.auth.jwks", error = %e, "Failed to fetch JWKS");
                    AuthError::KeyResolutionError("JWKS fetch failed".to_string())
                }
            })?;

        if !response.status().is_success() {
            record_jwks_fetch("error");
            tracing::error!(
                target: "og.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::KeyResolutionError(
                "JWKS endpoint returned error".to_string(),
            ));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            record_jwks_fetch("error");
            tracing::error!(target: "og.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::KeyResolutionError("JWKS document could not be parsed".to_string())
        })?;

        record_jwks_fetch("success");

        let mut cache = self.cache.write().await;
        for key in jwks.usable_keys() {
            cache.insert(key.kid.clone(), key);
        }

        tracing::info!(
            target: "og.auth.jwks",
            key_count = cache.len(),
            "JWKS cache refreshed"
        );

        Ok(())
    }

    /// Number of cached keys.
    pub async fn cached_key_count(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Public half of a 2048-bit test key
    const TEST_N: &str = "2gOaZOngTB194ZqLQHBRRpVKl9Jl1Vtm_WcaLLiijqUOQKIn9G-nF8ZfgWsnoKBdDN0pAwf7XTxtUdkxCVOFmCooSdtBIbaA8z-RW-sStH6KrCcH20ajqbEYKf3Xxyw6-8rOifAY2pAWkZtCGFgKemIv_sjFPX9rgokkrakw3zl4-6nzMsfKkysssFWHAfvFEgvu5lM6_ReoW2-IyLpZtpwJ6znBlzXBgHx1Iu01boouHcBm_b9GoHal8ixoOMkcSsHRZuZikJmbjfsTqbPt5a3ohReNiswRxlAkZUPJDEC8vLZln-EOyyuqga_L4a9Ptl4WkSz7736-vewBHNh1CQ";

    fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: kid.to_string(),
            n: Some(TEST_N.to_string()),
            e: Some("AQAB".to_string()),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
        }
    }

    fn jwks_body(kids: &[&str]) -> serde_json::Value {
        let keys: Vec<serde_json::Value> = kids
            .iter()
            .map(|kid| {
                serde_json::json!({
                    "kty": "RSA",
                    "kid": kid,
                    "n": TEST_N,
                    "e": "AQAB",
                    "alg": "RS256",
                    "use": "sig"
                })
            })
            .collect();
        serde_json::json!({ "keys": keys })
    }

    #[test]
    fn test_jwk_deserialization() {
        let json = format!(
            r#"{{"kty":"RSA","kid":"cognito-key-1","n":"{TEST_N}","e":"AQAB","alg":"RS256","use":"sig"}}"#
        );

        let jwk: Jwk = serde_json::from_str(&json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, "cognito-key-1");
        assert_eq!(jwk.e, Some("AQAB".to_string()));
        assert_eq!(jwk.alg, Some("RS256".to_string()));
        assert_eq!(jwk.key_use, Some("sig".to_string()));
    }

    #[test]
    fn test_jwk_deserialization_minimal() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty":"RSA","kid":"k"}"#).unwrap();

        assert!(jwk.n.is_none());
        assert!(jwk.e.is_none());
        assert!(jwk.alg.is_none());
        assert!(jwk.key_use.is_none());
    }

    #[test]
    fn test_usable_keys_skips_unreadable_entries() {
        let document = serde_json::json!({
            "keys": [
                { "kty": "RSA", "n": TEST_N, "e": "AQAB", "use": "sig" },
                { "kty": "RSA", "kid": 42 },
                "not-an-object",
                { "kty": "RSA", "kid": "key-1", "n": TEST_N, "e": "AQAB" }
            ]
        });

        let jwks: JwksResponse = serde_json::from_value(document).unwrap();
        let keys = jwks.usable_keys();

        assert_eq!(keys.len(), 1);
        assert_eq!(keys.first().unwrap().kid, "key-1");
    }

    #[tokio::test]
    async fn test_get_key_survives_key_without_kid() {
        let server = MockServer::start().await;
        let mut body = jwks_body(&["key-1"]);
        body["keys"]
            .as_array_mut()
            .unwrap()
            .insert(0, serde_json::json!({ "kty": "RSA", "n": TEST_N, "e": "AQAB" }));
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = JwksClient::new(format!("{}/.well-known/jwks.json", server.uri()));

        let key = client.get_key("key-1").await.unwrap();
        assert_eq!(key.kid, "key-1");
        assert_eq!(client.cached_key_count().await, 1);
    }

    #[test]
    fn test_decoding_key_valid_rsa() {
        assert!(rsa_jwk("k").decoding_key().is_ok());

        let mut no_hints = rsa_jwk("k");
        no_hints.alg = None;
        no_hints.key_use = None;
        assert!(no_hints.decoding_key().is_ok());
    }

    #[test]
    fn test_decoding_key_rejects_unusable_keys() {
        let mut okp = rsa_jwk("k");
        okp.kty = "OKP".to_string();
        assert!(matches!(
            okp.decoding_key(),
            Err(AuthError::KeyResolutionError(_))
        ));

        let mut enc = rsa_jwk("k");
        enc.key_use = Some("enc".to_string());
        assert!(matches!(
            enc.decoding_key(),
            Err(AuthError::KeyResolutionError(_))
        ));

        let mut rs512 = rsa_jwk("k");
        rs512.alg = Some("RS512".to_string());
        assert!(matches!(
            rs512.decoding_key(),
            Err(AuthError::KeyResolutionError(_))
        ));

        let mut no_modulus = rsa_jwk("k");
        no_modulus.n = None;
        assert!(matches!(
            no_modulus.decoding_key(),
            Err(AuthError::KeyResolutionError(_))
        ));
    }

    #[tokio::test]
    async fn test_get_key_fetches_once_then_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["key-1", "key-2"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = JwksClient::new(format!("{}/.well-known/jwks.json", server.uri()));

        let first = client.get_key("key-1").await.unwrap();
        assert_eq!(first.kid, "key-1");

        // Second key arrived with the same document
        let second = client.get_key("key-2").await.unwrap();
        assert_eq!(second.kid, "key-2");
        assert_eq!(client.cached_key_count().await, 2);
    }

    #[tokio::test]
    async fn test_get_key_unknown_kid_fetches_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&["key-1"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = JwksClient::new(format!("{}/.well-known/jwks.json", server.uri()));

        let result = client.get_key("rotated-away").await;
        assert!(matches!(result, Err(AuthError::KeyResolutionError(_))));
    }

    #[tokio::test]
    async fn test_get_key_endpoint_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = JwksClient::new(format!("{}/.well-known/jwks.json", server.uri()));

        let result = client.get_key("key-1").await;
        assert!(matches!(result, Err(AuthError::KeyResolutionError(_))));
        assert_eq!(client.cached_key_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_key_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_body(&["key-1"]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = JwksClient::with_timeout(
            format!("{}/.well-known/jwks.json", server.uri()),
            Duration::from_millis(200),
        );

        let result = client.get_key("key-1").await;
        assert!(matches!(result, Err(AuthError::KeyResolutionError(_))));
    }

    #[tokio::test]
    async fn test_get_key_unparseable_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = JwksClient::new(format!("{}/.well-known/jwks.json", server.uri()));

        let result = client.get_key("key-1").await;
        assert!(matches!(result, Err(AuthError::KeyResolutionError(_))));
    }

    #[test]
    fn test_jwks_client_custom_timeout() {
        let client = JwksClient::with_timeout(
            "http://localhost:9000/.well-known/jwks.json".to_string(),
            Duration::from_secs(2),
        );
        assert_eq!(client.fetch_timeout, Duration::from_secs(2));
        assert_eq!(client.jwks_url, "http://localhost:9000/.well-known/jwks.json");
    }
}
