//! Object storage abstraction.
//!
//! Handlers talk to the bucket only through [`ObjectStore`]. Keys passed in
//! here have already been derived or authorized by `KeyPolicy`; this layer
//! does no ownership checks of its own.
//!
//! # Components
//!
//! - `s3` - AWS S3 backend (`aws-sdk-s3`)
//! - `memory` - In-process backend with call counting, used by tests

pub mod memory;
pub mod s3;

use crate::policy::ObjectKey;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

pub use memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;

/// Hard cap on the number of keys returned by one listing.
pub const MAX_LIST_KEYS: i32 = 1000;

/// Storage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The object does not exist.
    #[error("Object not found")]
    NotFound,

    /// Any other backend failure. The detail is for logs only.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A time-limited URL granting one HTTP method on one key.
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    /// The pre-signed URL.
    pub url: String,
    /// When the URL stops working.
    pub expires_at: DateTime<Utc>,
}

/// A file received through direct upload, consumed by `put_object`.
#[derive(Debug, Clone)]
pub struct UploadDescriptor {
    /// File contents.
    pub bytes: Bytes,
    /// Declared MIME type.
    pub content_type: String,
    /// Filename as sent by the client. Only its extension reaches the key.
    pub original_filename: String,
}

/// Result of a successful `put_object`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    /// Base64 SHA-256 of the stored bytes.
    pub checksum_sha256: String,
    /// Stored size in bytes.
    pub size: u64,
    /// Entity tag reported by the backend.
    pub e_tag: Option<String>,
}

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: ObjectKey,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub e_tag: Option<String>,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    pub objects: Vec<ObjectSummary>,
    /// More keys exist beyond this page.
    pub truncated: bool,
}

/// Object storage operations used by the HTTP handlers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Pre-sign a PUT of `key` with the given content type.
    async fn presign_put(
        &self,
        key: &ObjectKey,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError>;

    /// Pre-sign a GET of `key`.
    async fn presign_get(
        &self,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError>;

    /// Store `upload` under `key`, overwriting any existing object.
    async fn put_object(
        &self,
        key: &ObjectKey,
        upload: UploadDescriptor,
    ) -> Result<PutOutcome, StorageError>;

    /// Fetch metadata of `key`. `StorageError::NotFound` if absent.
    async fn head_object(&self, key: &ObjectKey) -> Result<ObjectSummary, StorageError>;

    /// Delete `key`.
    async fn delete_object(&self, key: &ObjectKey) -> Result<(), StorageError>;

    /// List up to `max_keys` objects under `prefix`.
    async fn list_objects(
        &self,
        prefix: &ObjectKey,
        max_keys: i32,
    ) -> Result<ObjectListing, StorageError>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<(), StorageError>;
}

/// Base64 (standard alphabet) SHA-256 digest, the encoding S3 uses for
/// `x-amz-checksum-sha256`.
pub fn sha256_base64(bytes: &[u8]) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, bytes);
    STANDARD.encode(digest.as_ref())
}

/// Expiry instant for a URL signed now.
pub(crate) fn expires_at(expires_in: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(expires_in)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(now)
}
