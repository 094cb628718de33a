//! HTTP routes for Object Gateway.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, TokenVerifier, VerifierConfig};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::policy::KeyPolicy;
use crate::storage::ObjectStore;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Allowance for multipart boundaries and part headers on top of the file
/// size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Whole-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Bucket access.
    pub store: Arc<dyn ObjectStore>,

    /// Key namespace policy.
    pub policy: Arc<KeyPolicy>,

    /// Bearer token verifier.
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Wire the key policy and token verifier from configuration around a
    /// storage backend.
    pub fn new(config: Config, store: Arc<dyn ObjectStore>) -> Self {
        let jwks_client = Arc::new(JwksClient::with_timeout(
            config.jwks_url.clone(),
            Duration::from_secs(config.jwks_fetch_timeout_seconds),
        ));
        let verifier_config = VerifierConfig::new(config.auth_issuer.clone())
            .with_audience(config.cognito_client_id.clone())
            .with_clock_skew(Duration::from_secs(
                config.jwt_clock_skew_seconds.unsigned_abs(),
            ));

        Self {
            policy: Arc::new(KeyPolicy::new(config.namespace_root.clone())),
            verifier: Arc::new(TokenVerifier::new(jwks_client, verifier_config)),
            store,
            config,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/ready` - Readiness probe (checks storage) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/generate-upload-url` - Pre-signed PUT for a derived key - authenticated
/// - `/generate-download-url` - Pre-signed GET for an owned key - authenticated
/// - `/upload-image` - Direct multipart upload - authenticated
/// - `/delete-file` - Delete an owned object - authenticated
/// - `/list-files` - List the caller's objects - authenticated
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: state.verifier.clone(),
    });
    let upload_body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/generate-upload-url", get(handlers::generate_upload_url))
        .route("/generate-download-url", get(handlers::generate_download_url))
        .route(
            "/upload-image",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/delete-file", delete(handlers::delete_file))
        .route("/list-files", get(handlers::list_files))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}
