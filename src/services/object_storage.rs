//! src/services/object_storage.rs
//!
//! The narrow set of object-storage calls the upload service relies on,
//! expressed as a trait so the AWS client and the in-memory test store are
//! interchangeable.

use crate::models::listing::ObjectSummary;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    /// Error reported by the storage service with its native error code.
    #[error("{code}: {message}")]
    Service { code: String, message: String },
    /// The request never produced a service response (DNS, TLS, timeout...).
    #[error("storage request failed: {0}")]
    Transport(String),
}

impl StorageError {
    /// Native S3 error code, when the service supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            StorageError::BucketNotFound(_) => Some("NoSuchBucket"),
            StorageError::ObjectNotFound { .. } => Some("NoSuchKey"),
            StorageError::Service { code, .. } => Some(code),
            StorageError::Transport(_) => None,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Everything needed for a single-shot put.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
    /// Base64 of the MD5 digest of `body`, sent as `Content-MD5`.
    pub content_md5: String,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct PutReceipt {
    pub etag: Option<String>,
}

/// Object-storage operations used by `UploadService`.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn head_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Succeeds when the object exists; `ObjectNotFound` when it does not.
    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    async fn put_object(&self, bucket: &str, object: PutObject) -> StorageResult<PutReceipt>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// A single page of at most `max_keys` objects, in key order.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        max_keys: i32,
    ) -> StorageResult<Vec<ObjectSummary>>;
}
