//! AWS S3 backend.
//!
//! Direct uploads are stored with SSE-S3 (AES256) and carry a SHA-256
//! checksum that S3 verifies on receipt. Every call is timed and counted
//! under `og_storage_operations_total`.

use super::{
    expires_at, sha256_base64, ObjectListing, ObjectStore, ObjectSummary, PresignedUrl,
    PutOutcome, StorageError, UploadDescriptor,
};
use crate::config::Config;
use crate::observability::metrics::{record_storage_operation, record_uploaded_bytes};
use crate::policy::ObjectKey;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime as AwsDateTime};
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::instrument;

/// S3-backed object store for a single bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Wrap an existing client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from service configuration.
    ///
    /// Credentials come from the default provider chain.
    pub async fn from_config(config: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()));
        if let Some(endpoint) = &config.s3_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.s3_force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }

        tracing::info!(
            target: "og.storage.s3",
            bucket = %config.s3_bucket_name,
            region = %config.aws_region,
            custom_endpoint = config.s3_endpoint_url.is_some(),
            "S3 client configured"
        );

        Self::new(
            Client::from_conf(s3_builder.build()),
            config.s3_bucket_name.clone(),
        )
    }

    /// Bucket this store writes to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn backend_error(operation: &str, err: impl std::error::Error) -> StorageError {
    let detail = DisplayErrorContext(&err).to_string();
    tracing::error!(target: "og.storage.s3", operation = %operation, error = %detail, "S3 request failed");
    StorageError::Backend(format!("{operation}: {detail}"))
}

fn presigning_config(expires_in: Duration) -> Result<PresigningConfig, StorageError> {
    PresigningConfig::expires_in(expires_in)
        .map_err(|e| StorageError::Backend(format!("invalid presign expiry: {e}")))
}

fn observe<T>(operation: &'static str, start: Instant, result: &Result<T, StorageError>) {
    let status = match result {
        Ok(_) => "success",
        Err(StorageError::NotFound) => "not_found",
        Err(StorageError::Backend(_)) => "error",
    };
    record_storage_operation(operation, status, start.elapsed());
}

fn to_chrono(value: Option<&AwsDateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
}

fn to_size(value: Option<i64>) -> u64 {
    value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip_all, name = "og.storage.presign_put")]
    async fn presign_put(
        &self,
        key: &ObjectKey,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError> {
        let start = Instant::now();
        let result = async {
            let presigned = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key.as_str())
                .content_type(content_type)
                .presigned(presigning_config(expires_in)?)
                .await
                .map_err(|e| backend_error("presign_put", e))?;
            Ok(PresignedUrl {
                url: presigned.uri().to_string(),
                expires_at: expires_at(expires_in),
            })
        }
        .await;
        observe("presign_put", start, &result);
        result
    }

    #[instrument(skip_all, name = "og.storage.presign_get")]
    async fn presign_get(
        &self,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError> {
        let start = Instant::now();
        let result = async {
            let presigned = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key.as_str())
                .presigned(presigning_config(expires_in)?)
                .await
                .map_err(|e| backend_error("presign_get", e))?;
            Ok(PresignedUrl {
                url: presigned.uri().to_string(),
                expires_at: expires_at(expires_in),
            })
        }
        .await;
        observe("presign_get", start, &result);
        result
    }

    #[instrument(skip_all, name = "og.storage.put_object", fields(size = upload.bytes.len()))]
    async fn put_object(
        &self,
        key: &ObjectKey,
        upload: UploadDescriptor,
    ) -> Result<PutOutcome, StorageError> {
        let start = Instant::now();
        let checksum_sha256 = sha256_base64(&upload.bytes);
        let size = upload.bytes.len() as u64;

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .content_type(upload.content_type)
            .content_length(i64::try_from(size).unwrap_or(i64::MAX))
            .server_side_encryption(ServerSideEncryption::Aes256)
            .checksum_sha256(checksum_sha256.clone())
            .body(ByteStream::from(upload.bytes))
            .send()
            .await
            .map(|output| PutOutcome {
                checksum_sha256,
                size,
                e_tag: output.e_tag().map(str::to_string),
            })
            .map_err(|e| backend_error("put_object", e));

        observe("put_object", start, &result);
        if result.is_ok() {
            record_uploaded_bytes(size);
            tracing::debug!(target: "og.storage.s3", size, "Object stored");
        }
        result
    }

    #[instrument(skip_all, name = "og.storage.head_object")]
    async fn head_object(&self, key: &ObjectKey) -> Result<ObjectSummary, StorageError> {
        let start = Instant::now();
        let result = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
        {
            Ok(output) => Ok(ObjectSummary {
                key: key.clone(),
                size: to_size(output.content_length()),
                last_modified: to_chrono(output.last_modified()),
                e_tag: output.e_tag().map(str::to_string),
            }),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                Err(StorageError::NotFound)
            }
            Err(e) => Err(backend_error("head_object", e)),
        };
        observe("head_object", start, &result);
        result
    }

    #[instrument(skip_all, name = "og.storage.delete_object")]
    async fn delete_object(&self, key: &ObjectKey) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map(|_| ())
            .map_err(|e| backend_error("delete_object", e));
        observe("delete_object", start, &result);
        result
    }

    #[instrument(skip_all, name = "og.storage.list_objects")]
    async fn list_objects(
        &self,
        prefix: &ObjectKey,
        max_keys: i32,
    ) -> Result<ObjectListing, StorageError> {
        let start = Instant::now();
        let result = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix.as_str())
            .max_keys(max_keys)
            .send()
            .await
            .map(|output| ObjectListing {
                objects: output
                    .contents()
                    .iter()
                    .filter_map(|object| {
                        Some(ObjectSummary {
                            key: ObjectKey::new(object.key()?),
                            size: to_size(object.size()),
                            last_modified: to_chrono(object.last_modified()),
                            e_tag: object.e_tag().map(str::to_string),
                        })
                    })
                    .collect(),
                truncated: output.is_truncated().unwrap_or(false),
            })
            .map_err(|e| backend_error("list_objects", e));
        observe("list_objects", start, &result);
        result
    }

    #[instrument(skip_all, name = "og.storage.health_check")]
    async fn health_check(&self) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| backend_error("head_bucket", e));
        observe("head_bucket", start, &result);
        result
    }
}
