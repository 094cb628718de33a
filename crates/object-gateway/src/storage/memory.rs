//! In-process object store.
//!
//! Backs integration tests and local runs without a bucket. Counts every
//! call so tests can assert that rejected requests never reached storage,
//! and can be switched into a failing mode.

use super::{
    expires_at, sha256_base64, ObjectListing, ObjectStore, ObjectSummary, PresignedUrl,
    PutOutcome, StorageError, UploadDescriptor,
};
use crate::policy::ObjectKey;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// An object held in memory.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
    pub checksum_sha256: String,
    pub last_modified: DateTime<Utc>,
}

impl StoredObject {
    /// Quoted hex SHA-256, standing in for an S3 ETag.
    fn e_tag(&self) -> String {
        let digest = ring::digest::digest(&ring::digest::SHA256, &self.bytes);
        format!("\"{}\"", hex::encode(digest.as_ref()))
    }

    fn summary(&self, key: &str) -> ObjectSummary {
        ObjectSummary {
            key: ObjectKey::new(key),
            size: self.bytes.len() as u64,
            last_modified: Some(self.last_modified),
            e_tag: Some(self.e_tag()),
        }
    }
}

/// Object store backed by a sorted in-memory map.
pub struct InMemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    call_count: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryObjectStore {
    /// Create an empty store.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            call_count: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Create a store whose every call fails with a backend error.
    pub fn failing(bucket: impl Into<String>) -> Self {
        let store = Self::new(bucket);
        store.set_failing(true);
        store
    }

    /// Toggle the failing mode.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of trait calls made so far, across all operations.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Insert an object directly, bypassing call counting.
    pub async fn insert(&self, key: &str, bytes: impl Into<Bytes>, content_type: &str) {
        let bytes = bytes.into();
        let object = StoredObject {
            checksum_sha256: sha256_base64(&bytes),
            bytes,
            content_type: content_type.to_string(),
            last_modified: Utc::now(),
        };
        self.objects.write().await.insert(key.to_string(), object);
    }

    /// Fetch an object directly, bypassing call counting.
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    /// All stored keys in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    fn enter(&self, operation: &str) -> Result<(), StorageError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!(
                "{operation}: in-memory store set to fail"
            )));
        }
        Ok(())
    }

    fn presigned_url(&self, method: &str, key: &ObjectKey, expires_in: Duration) -> PresignedUrl {
        PresignedUrl {
            url: format!(
                "memory://{}/{}?method={}&expires_in={}",
                self.bucket,
                key,
                method,
                expires_in.as_secs()
            ),
            expires_at: expires_at(expires_in),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn presign_put(
        &self,
        key: &ObjectKey,
        _content_type: &str,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError> {
        self.enter("presign_put")?;
        Ok(self.presigned_url("PUT", key, expires_in))
    }

    async fn presign_get(
        &self,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError> {
        self.enter("presign_get")?;
        Ok(self.presigned_url("GET", key, expires_in))
    }

    async fn put_object(
        &self,
        key: &ObjectKey,
        upload: UploadDescriptor,
    ) -> Result<PutOutcome, StorageError> {
        self.enter("put_object")?;
        let object = StoredObject {
            checksum_sha256: sha256_base64(&upload.bytes),
            bytes: upload.bytes,
            content_type: upload.content_type,
            last_modified: Utc::now(),
        };
        let outcome = PutOutcome {
            checksum_sha256: object.checksum_sha256.clone(),
            size: object.bytes.len() as u64,
            e_tag: Some(object.e_tag()),
        };
        self.objects
            .write()
            .await
            .insert(key.as_str().to_string(), object);
        Ok(outcome)
    }

    async fn head_object(&self, key: &ObjectKey) -> Result<ObjectSummary, StorageError> {
        self.enter("head_object")?;
        self.objects
            .read()
            .await
            .get(key.as_str())
            .map(|object| object.summary(key.as_str()))
            .ok_or(StorageError::NotFound)
    }

    async fn delete_object(&self, key: &ObjectKey) -> Result<(), StorageError> {
        self.enter("delete_object")?;
        // S3 semantics: deleting a missing key succeeds
        self.objects.write().await.remove(key.as_str());
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &ObjectKey,
        max_keys: i32,
    ) -> Result<ObjectListing, StorageError> {
        self.enter("list_objects")?;
        let limit = usize::try_from(max_keys).unwrap_or(0);
        let objects = self.objects.read().await;
        let mut matching = objects
            .range(prefix.as_str().to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix.as_str()));

        let page: Vec<ObjectSummary> = matching
            .by_ref()
            .take(limit)
            .map(|(key, object)| object.summary(key))
            .collect();
        let truncated = matching.next().is_some();

        Ok(ObjectListing {
            objects: page,
            truncated,
        })
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        self.enter("health_check")
    }
}
