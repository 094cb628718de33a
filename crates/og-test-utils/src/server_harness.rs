//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances backed by
//! an in-memory object store.

use crate::token_builders::{TEST_CLIENT_ID, TEST_ISSUER};
use metrics_exporter_prometheus::PrometheusHandle;
use object_gateway::config::Config;
use object_gateway::observability::metrics::init_metrics_recorder;
use object_gateway::routes::{self, AppState};
use object_gateway::storage::InMemoryObjectStore;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Bucket name the test server is configured with.
pub const TEST_BUCKET: &str = "test-bucket";

/// Upload limit the test server is configured with (64 KiB).
pub const TEST_MAX_UPLOAD_BYTES: usize = 64 * 1024;

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Test harness for spawning the Object Gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let jwks = TestJwksServer::start().await;
///     let server = TestGatewayServer::spawn(&jwks.jwks_url()).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    store: Arc<InMemoryObjectStore>,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a server with an empty store trusting the given JWKS URL.
    pub async fn spawn(jwks_url: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with(
            jwks_url,
            Arc::new(InMemoryObjectStore::new(TEST_BUCKET)),
            &[],
        )
        .await
    }

    /// Spawn a server over a caller-provided store.
    ///
    /// `overrides` replace or extend the default environment, e.g.
    /// `("COGNITO_CLIENT_ID", "")` to disable the audience check.
    pub async fn spawn_with(
        jwks_url: &str,
        store: Arc<InMemoryObjectStore>,
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        // Build configuration for test environment
        let mut vars = HashMap::from([
            ("AWS_REGION".to_string(), "us-east-1".to_string()),
            (
                "COGNITO_USER_POOL_ID".to_string(),
                "us-east-1_TestPool".to_string(),
            ),
            ("S3_BUCKET_NAME".to_string(), TEST_BUCKET.to_string()),
            ("COGNITO_CLIENT_ID".to_string(), TEST_CLIENT_ID.to_string()),
            ("AUTH_ISSUER".to_string(), TEST_ISSUER.to_string()),
            ("JWKS_URL".to_string(), jwks_url.to_string()),
            ("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "MAX_UPLOAD_BYTES".to_string(),
                TEST_MAX_UPLOAD_BYTES.to_string(),
            ),
        ]);
        for (name, value) in overrides {
            vars.insert((*name).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::new(config.clone(), store.clone()));

        // Build routes using object-gateway's real route builder
        let app = routes::build_routes(state, get_test_metrics_handle());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            store,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the backing store, for seeding objects and counting calls.
    pub fn store(&self) -> &InMemoryObjectStore {
        &self.store
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends.
        self._handle.abort();
    }
}
