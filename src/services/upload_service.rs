//! src/services/upload_service.rs
//!
//! UploadService: turns upload/delete/list/connection-test requests into
//! calls on the shared `ObjectStorage` handle and classifies every failure
//! under a stable error code.

use crate::{
    config::S3Settings,
    models::{listing::ObjectSummary, upload::UploadRequest},
    services::object_storage::{ObjectStorage, PutObject, StorageError},
};
use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Standard alphabet; trailing `=` padding accepted but not required.
const CONTENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const UPLOADED_BY: &str = "s3-upload-service";
pub const MAX_LIST_KEYS: usize = 1000;

/// Extension → MIME type, matched case-insensitively on the file name suffix.
const CONTENT_TYPES: [(&str, &str); 10] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("S3 configuration incomplete, check: {missing}")]
    Configuration { missing: String },
    #[error("file content is not valid Base64: {0}")]
    InvalidFileContent(#[from] base64::DecodeError),
    #[error("object `{0}` already exists; set overwrite=true to replace it")]
    FileAlreadyExists(String),
    #[error("object `{0}` not found")]
    FileNotFound(String),
    #[error("bucket `{0}` does not exist")]
    BucketNotFound(String),
    #[error("storage error: {message}")]
    Storage { code: String, message: String },
    #[error("unexpected storage failure: {0}")]
    Unknown(String),
}

impl UploadError {
    pub fn error_code(&self) -> &str {
        match self {
            UploadError::Configuration { .. } => "CONFIGURATION_ERROR",
            UploadError::InvalidFileContent(_) => "INVALID_FILE_CONTENT",
            UploadError::FileAlreadyExists(_) => "FILE_ALREADY_EXISTS",
            UploadError::FileNotFound(_) => "FILE_NOT_FOUND",
            UploadError::BucketNotFound(_) => "BUCKET_NOT_FOUND",
            UploadError::Storage { code, .. } => code.as_str(),
            UploadError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }
}

impl From<StorageError> for UploadError {
    fn from(err: StorageError) -> Self {
        match err.code() {
            Some(code) => UploadError::Storage {
                code: code.to_string(),
                message: err.to_string(),
            },
            None => UploadError::Unknown(err.to_string()),
        }
    }
}

pub type ServiceResult<T> = Result<T, UploadError>;

/// Outcome of an existence probe. A failed probe is reported separately so
/// each caller decides what "could not check" means.
#[derive(Debug)]
pub enum ObjectPresence {
    Found,
    NotFound,
    ProbeFailed(StorageError),
}

/// A successfully stored upload.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
    pub bucket: String,
}

/// Process-wide context shared by every request: immutable settings and the
/// optional storage handle built once at startup.
#[derive(Clone)]
pub struct UploadService {
    settings: Arc<S3Settings>,
    storage: Option<Arc<dyn ObjectStorage>>,
}

impl UploadService {
    pub fn new(settings: S3Settings, storage: Option<Arc<dyn ObjectStorage>>) -> Self {
        Self {
            settings: Arc::new(settings),
            storage,
        }
    }

    pub fn bucket(&self) -> &str {
        self.settings.bucket()
    }

    pub fn is_configured(&self) -> bool {
        self.storage.is_some() && self.settings.is_valid()
    }

    fn storage(&self) -> ServiceResult<&Arc<dyn ObjectStorage>> {
        match &self.storage {
            Some(storage) if self.settings.is_valid() => Ok(storage),
            _ => {
                error!("S3 client unavailable; configuration incomplete");
                Err(UploadError::Configuration {
                    missing: self.settings.missing_summary(),
                })
            }
        }
    }

    /// Verify the configured bucket is reachable. Returns the bucket name.
    pub async fn test_connection(&self) -> ServiceResult<String> {
        info!("Testing S3 connection");
        let storage = self.storage()?;
        let bucket = self.bucket();

        match storage.head_bucket(bucket).await {
            Ok(()) => {
                info!("S3 connection ok, bucket `{}` reachable", bucket);
                Ok(bucket.to_string())
            }
            Err(StorageError::BucketNotFound(_)) => {
                error!("Bucket `{}` does not exist", bucket);
                Err(UploadError::BucketNotFound(bucket.to_string()))
            }
            Err(err) => {
                error!("S3 connection test failed: {}", err);
                Err(err.into())
            }
        }
    }

    /// Decode and store a Base64 payload under a freshly generated key.
    pub async fn upload_file(&self, request: &UploadRequest) -> ServiceResult<StoredFile> {
        info!("Uploading file {}", request.file_name);
        let storage = self.storage()?;

        let body = CONTENT_ENGINE
            .decode(request.file_content.trim())
            .map_err(|err| {
                warn!("Rejecting upload of {}: {}", request.file_name, err);
                UploadError::InvalidFileContent(err)
            })?;
        debug!("Decoded {} bytes", body.len());

        let now = Utc::now();
        let key = build_storage_key(
            request.path_prefix.as_deref(),
            &request.file_name,
            now,
            Uuid::new_v4(),
        );
        debug!("Generated storage key {}", key);

        if !request.overwrite {
            match self.file_exists(&key).await? {
                ObjectPresence::Found => {
                    warn!("Refusing to overwrite existing object {}", key);
                    return Err(UploadError::FileAlreadyExists(key));
                }
                ObjectPresence::NotFound => {}
                ObjectPresence::ProbeFailed(err) => {
                    warn!("Could not check whether {} exists, uploading anyway: {}", key, err);
                }
            }
        }

        let content_type =
            resolve_content_type(request.content_type.as_deref(), &request.file_name);
        let size = body.len() as u64;
        let content_md5 = general_purpose::STANDARD.encode(md5::compute(&body).0);

        let object = PutObject {
            key: key.clone(),
            body: Bytes::from(body),
            content_type: content_type.clone(),
            content_md5,
            metadata: vec![
                ("original-filename".into(), request.file_name.clone()),
                ("upload-timestamp".into(), now.to_rfc3339()),
                ("uploaded-by".into(), UPLOADED_BY.into()),
            ],
        };

        let receipt = storage
            .put_object(self.bucket(), object)
            .await
            .map_err(|err| {
                error!("Upload of {} failed: {}", key, err);
                UploadError::from(err)
            })?;
        info!("Uploaded {} (etag {:?})", key, receipt.etag);

        Ok(StoredFile {
            url: file_url(&self.settings, &key),
            key,
            size,
            content_type,
            bucket: self.bucket().to_string(),
        })
    }

    /// Probe for `key`; only a missing client is an error here.
    pub async fn file_exists(&self, key: &str) -> ServiceResult<ObjectPresence> {
        let storage = self.storage()?;
        Ok(match storage.head_object(self.bucket(), key).await {
            Ok(()) => ObjectPresence::Found,
            Err(StorageError::ObjectNotFound { .. }) => ObjectPresence::NotFound,
            Err(err) => {
                warn!("Existence check for {} failed: {}", key, err);
                ObjectPresence::ProbeFailed(err)
            }
        })
    }

    /// Delete an existing object. Returns the deleted key.
    pub async fn delete_file(&self, key: &str) -> ServiceResult<String> {
        info!("Deleting {}", key);
        let storage = self.storage()?;

        match self.file_exists(key).await? {
            ObjectPresence::Found => {}
            ObjectPresence::NotFound => return Err(UploadError::FileNotFound(key.to_string())),
            ObjectPresence::ProbeFailed(err) => return Err(err.into()),
        }

        storage
            .delete_object(self.bucket(), key)
            .await
            .map_err(|err| {
                error!("Delete of {} failed: {}", key, err);
                UploadError::from(err)
            })?;
        info!("Deleted {}", key);

        Ok(key.to_string())
    }

    /// One page of objects, at most `min(max_keys, 1000)` long.
    pub async fn list_files(
        &self,
        prefix: Option<&str>,
        max_keys: usize,
    ) -> ServiceResult<Vec<ObjectSummary>> {
        let prefix = prefix.filter(|p| !p.trim().is_empty());
        let max_keys = max_keys.min(MAX_LIST_KEYS);
        info!("Listing files, prefix={:?}, max_keys={}", prefix, max_keys);
        let storage = self.storage()?;

        let mut files = storage
            .list_objects(self.bucket(), prefix, max_keys as i32)
            .await
            .map_err(|err| {
                error!("Listing failed: {}", err);
                UploadError::from(err)
            })?;
        files.truncate(max_keys);
        info!("Found {} files", files.len());

        Ok(files)
    }
}

/// `<prefix>/<token>_<file name>`, with a dated `uploads/yyyy/MM/dd/`
/// prefix when none is given.
pub fn build_storage_key(
    prefix: Option<&str>,
    file_name: &str,
    now: DateTime<Utc>,
    token: Uuid,
) -> String {
    let mut prefix = match prefix.filter(|p| !p.trim().is_empty()) {
        Some(p) => p.to_string(),
        None => format!("uploads/{}/", now.format("%Y/%m/%d")),
    };
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    format!("{}{}_{}", prefix, token, file_name)
}

pub fn resolve_content_type(explicit: Option<&str>, file_name: &str) -> String {
    if let Some(content_type) = explicit.map(str::trim).filter(|c| !c.is_empty()) {
        return content_type.to_string();
    }

    let lower = file_name.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(ext, _)| {
            lower
                .strip_suffix(ext)
                .is_some_and(|stem| stem.ends_with('.'))
        })
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Public URL of a stored object: path-style under the custom endpoint when
/// one is configured, virtual-hosted AWS URL otherwise.
pub fn file_url(settings: &S3Settings, key: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes())
        .collect::<String>()
        .replace('+', "%20");

    match settings.endpoint() {
        Some(endpoint) => format!(
            "{}/{}/{}",
            endpoint.trim_end_matches('/'),
            settings.bucket(),
            encoded
        ),
        None => format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            settings.bucket(),
            settings.region.trim(),
            encoded
        ),
    }
}
