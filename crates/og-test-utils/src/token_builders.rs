//! Builder patterns for test token construction
//!
//! Provides a fluent API for identity-provider style access tokens, signed
//! with the fixture keys or deliberately malformed.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Issuer the test server is configured with.
pub const TEST_ISSUER: &str = "https://idp.test.local/pool";

/// App client ID the test server is configured with.
pub const TEST_CLIENT_ID: &str = "test-client-id";

/// Builder for creating test JWTs
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .expires_in(3600)
///     .sign_rs256(TEST_KEY_A_PEM, TEST_KID_A);
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults: subject "test-subject",
    /// the test issuer and audience, issued now, valid for an hour.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_CLIENT_ID));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        Self { claims }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    /// Set the issuer
    pub fn issued_by(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    /// Set a single-valued audience
    pub fn for_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Replace `aud` with a `client_id` claim, as in access tokens
    pub fn with_client_id(self, client_id: &str) -> Self {
        self.without_claim("aud")
            .with_claim("client_id", json!(client_id))
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign with an RSA private key under the given key ID.
    pub fn sign_rs256(self, private_key_pem: &str, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .expect("fixture key should parse");
        encode(&header, &self.claims, &key).expect("signing should succeed")
    }

    /// Sign with a shared secret. The gateway must reject these.
    pub fn sign_hs256(self, secret: &[u8], kid: &str) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &self.claims, &EncodingKey::from_secret(secret))
            .expect("signing should succeed")
    }

    /// Produce an `alg: none` token with an empty signature segment.
    pub fn unsigned(self, kid: &str) -> String {
        let header = json!({ "alg": "none", "typ": "JWT", "kid": kid });
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(Value::Object(self.claims).to_string())
        )
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
