//! Direct file handlers: upload, delete and list.
//!
//! All three act on the caller's namespace only. Ownership is established
//! before storage is consulted, so a 404 is only ever reported for keys the
//! caller would be allowed to see.

use super::require_param;
use crate::auth::VerifiedIdentity;
use crate::config::Config;
use crate::errors::GatewayError;
use crate::models::{DeleteResponse, FileEntry, KeyQuery, ListFilesResponse, UploadResponse};
use crate::policy::ObjectKey;
use crate::routes::AppState;
use crate::storage::{UploadDescriptor, MAX_LIST_KEYS};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD_NAME: &str = "image";

/// Handler for POST /upload-image
///
/// Accepts a multipart body with the file in the `image` field, stores it
/// under a derived key with server-side encryption and a SHA-256 checksum,
/// and returns 201 with the stored object's details.
///
/// # Errors
///
/// - 400 if the body is not multipart, the field is missing or empty, or the
///   MIME type is not `image/*`
/// - 413 if the file exceeds the configured limit
/// - 500 if storage fails
#[instrument(skip_all, name = "og.handlers.upload_image")]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<VerifiedIdentity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), GatewayError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(target: "og.handlers.files", error = %e, "Rejected non-multipart upload");
        GatewayError::BadRequest("Expected a multipart/form-data body".to_string())
    })?;

    let upload = read_upload_field(&mut multipart, state.config.max_upload_bytes).await?;

    if !upload.content_type.starts_with("image/") {
        return Err(GatewayError::BadRequest(
            "Only image uploads are allowed".to_string(),
        ));
    }

    let key = state
        .policy
        .derive_upload_key(identity.subject(), &upload.original_filename);
    let content_type = upload.content_type.clone();

    let outcome = state.store.put_object(&key, upload).await?;

    tracing::info!(
        target: "og.handlers.files",
        size = outcome.size,
        content_type = %content_type,
        "File uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            location: object_location(&state.config, &key),
            key: key.into_string(),
            checksum: outcome.checksum_sha256,
            size: outcome.size,
            content_type,
        }),
    ))
}

/// Read the `image` field into an upload descriptor, skipping other fields.
async fn read_upload_field(
    multipart: &mut Multipart,
    max_upload_bytes: usize,
) -> Result<UploadDescriptor, GatewayError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_ascii_lowercase();
        let original_filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        if bytes.is_empty() {
            return Err(GatewayError::BadRequest("Uploaded file is empty".to_string()));
        }
        if bytes.len() > max_upload_bytes {
            return Err(too_large(max_upload_bytes));
        }

        return Ok(UploadDescriptor {
            bytes,
            content_type,
            original_filename,
        });
    }

    Err(GatewayError::BadRequest(format!(
        "No file uploaded (expected multipart field '{UPLOAD_FIELD_NAME}')"
    )))
}

fn multipart_error(err: MultipartError) -> GatewayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge("Uploaded file is too large".to_string())
    } else {
        tracing::debug!(target: "og.handlers.files", error = %err, "Malformed multipart body");
        GatewayError::BadRequest("Malformed multipart body".to_string())
    }
}

fn too_large(max_upload_bytes: usize) -> GatewayError {
    GatewayError::PayloadTooLarge(format!(
        "Uploaded file exceeds the {max_upload_bytes} byte limit"
    ))
}

/// Unsigned URL of a stored object.
fn object_location(config: &Config, key: &ObjectKey) -> String {
    match &config.s3_endpoint_url {
        Some(endpoint) => format!(
            "{}/{}/{}",
            endpoint.trim_end_matches('/'),
            config.s3_bucket_name,
            key
        ),
        None => format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            config.s3_bucket_name, config.aws_region, key
        ),
    }
}

/// Handler for DELETE /delete-file?key=..
///
/// # Errors
///
/// - 400 if `key` is missing
/// - 403 if `key` is outside the caller's namespace
/// - 404 with `exists: false` if the object does not exist
/// - 500 if storage fails
#[instrument(skip_all, name = "og.handlers.delete_file")]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<DeleteResponse>, GatewayError> {
    let key = require_param(query.key, "key")?;

    state.policy.authorize_access(identity.subject(), &key)?;

    let key = ObjectKey::new(key);

    // S3 deletes of missing keys succeed silently, so existence is checked first
    state.store.head_object(&key).await?;
    state.store.delete_object(&key).await?;

    tracing::info!(target: "og.handlers.files", "File deleted");

    Ok(Json(DeleteResponse {
        deleted: true,
        key: key.into_string(),
    }))
}

/// Handler for GET /list-files
///
/// Lists up to 1000 objects under the caller's namespace prefix.
///
/// # Errors
///
/// - 500 if storage fails
#[instrument(skip_all, name = "og.handlers.list_files")]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Result<Json<ListFilesResponse>, GatewayError> {
    let prefix = state.policy.scoped_prefix(identity.subject());

    let listing = state.store.list_objects(&prefix, MAX_LIST_KEYS).await?;

    let files: Vec<FileEntry> = listing
        .objects
        .into_iter()
        .filter(|object| {
            let in_scope = object.key.starts_with(&prefix);
            if !in_scope {
                tracing::warn!(target: "og.handlers.files", "Dropped listed key outside caller namespace");
            }
            in_scope
        })
        .map(|object| FileEntry {
            filename: object.key.file_name().to_string(),
            key: object.key.into_string(),
            size: object.size,
            last_modified: object.last_modified,
            checksum: object.e_tag,
        })
        .collect();

    tracing::debug!(target: "og.handlers.files", count = files.len(), truncated = listing.truncated, "Files listed");

    Ok(Json(ListFilesResponse {
        count: files.len(),
        files,
        truncated: listing.truncated,
    }))
}
