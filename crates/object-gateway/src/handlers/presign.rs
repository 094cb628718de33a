//! Pre-signed URL handlers.
//!
//! The client uploads or downloads directly against the bucket with the
//! returned URL. Upload keys are always derived server-side; download keys
//! must lie in the caller's namespace.

use super::require_param;
use crate::auth::VerifiedIdentity;
use crate::errors::GatewayError;
use crate::models::{KeyQuery, PresignedUrlResponse, UploadUrlQuery};
use crate::policy::ObjectKey;
use crate::routes::AppState;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Handler for GET /generate-upload-url?filename=..&type=..
///
/// Returns a pre-signed PUT URL for a freshly derived key. Only the
/// extension of `filename` is used; `type` is bound into the signature, so
/// the upload must send the same Content-Type.
///
/// # Errors
///
/// - 400 if `filename` or `type` is missing
/// - 500 if signing fails
#[instrument(skip_all, name = "og.handlers.generate_upload_url")]
pub async fn generate_upload_url(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Query(query): Query<UploadUrlQuery>,
) -> Result<Json<PresignedUrlResponse>, GatewayError> {
    let filename = require_param(query.filename, "filename")?;
    let content_type = require_param(query.content_type, "type")?;

    let key = state
        .policy
        .derive_upload_key(identity.subject(), &filename);
    let ttl = state.config.presigned_url_ttl_seconds;

    let presigned = state
        .store
        .presign_put(&key, &content_type, Duration::from_secs(ttl))
        .await?;

    tracing::debug!(target: "og.handlers.presign", expires_in = ttl, "Issued upload URL");

    Ok(Json(PresignedUrlResponse {
        url: presigned.url,
        key: key.into_string(),
        expires_in: ttl,
    }))
}

/// Handler for GET /generate-download-url?key=..
///
/// Returns a pre-signed GET URL for a key in the caller's namespace.
///
/// # Errors
///
/// - 400 if `key` is missing
/// - 403 if `key` is outside the caller's namespace
/// - 500 if signing fails
#[instrument(skip_all, name = "og.handlers.generate_download_url")]
pub async fn generate_download_url(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<PresignedUrlResponse>, GatewayError> {
    let key = require_param(query.key, "key")?;

    state.policy.authorize_access(identity.subject(), &key)?;

    let key = ObjectKey::new(key);
    let ttl = state.config.presigned_url_ttl_seconds;

    let presigned = state
        .store
        .presign_get(&key, Duration::from_secs(ttl))
        .await?;

    tracing::debug!(target: "og.handlers.presign", expires_in = ttl, "Issued download URL");

    Ok(Json(PresignedUrlResponse {
        url: presigned.url,
        key: key.into_string(),
        expires_in: ttl,
    }))
}
