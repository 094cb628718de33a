//! Mock identity-provider JWKS endpoint.

use crate::crypto_fixtures::default_jwks_document;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock publishes its key set under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A wiremock server publishing a JWKS document.
pub struct TestJwksServer {
    server: MockServer,
}

impl TestJwksServer {
    /// Start a server publishing fixture key A.
    pub async fn start() -> Self {
        Self::with_document(default_jwks_document()).await
    }

    /// Start a server publishing the given document.
    pub async fn with_document(document: Value) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&server)
            .await;
        Self { server }
    }

    /// Start a server whose JWKS endpoint always fails.
    pub async fn unavailable() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Self { server }
    }

    /// Full URL of the JWKS document.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Number of JWKS fetches received so far.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}
