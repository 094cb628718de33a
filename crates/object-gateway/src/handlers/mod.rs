//! HTTP request handlers for Object Gateway.
//!
//! # Handlers
//!
//! - `health` - Liveness and readiness probes
//! - `metrics` - Prometheus scrape endpoint
//! - `presign` - Pre-signed upload and download URLs
//! - `files` - Direct upload, delete and listing

pub mod files;
pub mod health;
pub mod metrics;
pub mod presign;

pub use files::{delete_file, list_files, upload_image};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use presign::{generate_download_url, generate_upload_url};

use crate::errors::GatewayError;

/// Unwrap a query parameter, rejecting absent or blank values with a 400
/// that names the parameter.
pub(crate) fn require_param(value: Option<String>, name: &str) -> Result<String, GatewayError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(GatewayError::BadRequest(format!(
            "Missing required query parameter: {name}"
        ))),
    }
}
