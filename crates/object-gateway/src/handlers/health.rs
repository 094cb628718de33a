//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks that the storage backend answers

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 if the storage backend is reachable, 503 otherwise. The
/// JWKS document is fetched lazily on first use and is not probed here.
///
/// Error messages are generic; the actual failure is logged server-side.
#[tracing::instrument(skip_all, name = "og.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.store.health_check().await {
        tracing::warn!(target: "og.health", error = %e, "Readiness check failed: storage unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                storage: Some("unavailable"),
                error: Some("Service dependencies unavailable".to_string()),
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            storage: Some("available"),
            error: None,
        }),
    )
}
