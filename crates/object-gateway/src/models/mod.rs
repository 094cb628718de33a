//! Object Gateway request and response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Readiness probe response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Storage backend reachability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<&'static str>,

    /// Error message (generic, no infrastructure details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Query parameters
// ============================================================================

/// Query for `GET /generate-upload-url`.
///
/// Fields are optional so that a missing one is answered with a message
/// naming it rather than a generic extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadUrlQuery {
    pub filename: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
}

/// Query carrying a single object key.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// A pre-signed URL and the key it grants access to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignedUrlResponse {
    pub url: String,
    pub key: String,
    /// Seconds until the URL expires.
    pub expires_in: u64,
}

/// Result of `POST /upload-image`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub key: String,
    /// Unsigned object URL.
    pub location: String,
    /// Base64 SHA-256 of the stored bytes.
    pub checksum: String,
    pub size: u64,
    pub content_type: String,
}

/// Result of `DELETE /delete-file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub key: String,
}

/// One entry of `GET /list-files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Backend entity tag.
    pub checksum: Option<String>,
    /// Last key segment.
    pub filename: String,
}

/// Result of `GET /list-files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFilesResponse {
    pub files: Vec<FileEntry>,
    pub count: usize,
    /// More objects exist than were returned.
    pub truncated: bool,
}
