//! Prometheus metrics endpoint handler.
//!
//! Unauthenticated so Prometheus can scrape it. Labels are bounded and
//! carry no subjects, keys or tokens.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format:
/// ```text
/// # TYPE og_http_requests_total counter
/// og_http_requests_total{method="GET",endpoint="/list-files",status_code="200"} 42
/// ```
#[tracing::instrument(skip_all, name = "og.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
