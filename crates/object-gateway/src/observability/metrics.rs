//! Metrics definitions for Object Gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `og_` prefix for Object Gateway
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `status`: success, error, timeout
//! - `outcome`: token verification outcome, bounded by `AuthError` variants
//! - `operation`: bounded by the `ObjectStore` trait methods
//!
//! Subjects, object keys and filenames are never used as label values.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("og_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
                5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Uploads stream whole bodies to the backend, so the tail is longer
        .set_buckets_for_metric(
            Matcher::Prefix("og_storage_operation".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set storage operation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `og_http_requests_total`, `og_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("og_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("og_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to the fixed route table.
///
/// Object keys travel in query strings, so paths never carry user data,
/// but unknown paths still collapse to `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/generate-upload-url" => "/generate-upload-url",
        "/generate-download-url" => "/generate-download-url",
        "/upload-image" => "/upload-image",
        "/delete-file" => "/delete-file",
        "/list-files" => "/list-files",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record the outcome of a bearer token verification
///
/// Metric: `og_token_validations_total`
/// Labels: `outcome` (`success` or an `AuthError` label)
pub fn record_token_validation(outcome: &'static str) {
    counter!("og_token_validations_total", "outcome" => outcome).increment(1);
}

/// Record a JWKS document fetch
///
/// Metric: `og_jwks_fetch_total`
/// Labels: `status` (success, error, timeout)
pub fn record_jwks_fetch(status: &'static str) {
    counter!("og_jwks_fetch_total", "status" => status).increment(1);
}

// ============================================================================
// Storage Metrics
// ============================================================================

/// Record a storage backend call
///
/// Metric: `og_storage_operations_total`, `og_storage_operation_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_storage_operation(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("og_storage_operation_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("og_storage_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record bytes accepted through direct upload
///
/// Metric: `og_uploaded_bytes_total`
pub fn record_uploaded_bytes(bytes: u64) {
    counter!("og_uploaded_bytes_total").increment(bytes);
}
