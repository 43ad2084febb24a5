//! Upload request and the structured result returned by every endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/s3/upload`.
///
/// Missing string fields deserialize as empty so that `validate` can report
/// them by name instead of failing JSON parsing.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadRequest {
    /// File payload, Base64-encoded.
    pub file_content: String,

    /// Original file name, including extension.
    pub file_name: String,

    /// Key prefix inside the bucket (e.g. `images/`). Defaults to a dated
    /// `uploads/` folder when absent.
    pub path_prefix: Option<String>,

    /// MIME type. Inferred from the file extension when absent.
    pub content_type: Option<String>,

    /// Allow replacing an object already stored under the same key.
    pub overwrite: bool,
}

impl UploadRequest {
    /// Check required fields, returning `field: reason` messages joined by `; `.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();
        if self.file_content.trim().is_empty() {
            errors.push("fileContent: must not be blank");
        }
        if self.file_name.trim().is_empty() {
            errors.push("fileName: must not be blank");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

/// Uniform success/failure envelope.
///
/// Successful results carry the fields relevant to the operation; failures
/// always carry `error_code`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,

    pub message: String,

    /// Full storage key of the object.
    #[serde(rename = "s3Key", skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,

    /// Size in bytes of the decoded payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl UploadResult {
    fn empty(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            storage_key: None,
            file_url: None,
            file_size: None,
            content_type: None,
            bucket_name: None,
            timestamp: Utc::now(),
            error_code: None,
        }
    }

    /// A success carrying only a message; populate the rest with the `with_*` helpers.
    pub fn ok(message: impl Into<String>) -> Self {
        Self::empty(true, message)
    }

    pub fn failure(message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            error_code: Some(error_code.into()),
            ..Self::empty(false, message)
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket_name = Some(bucket.into());
        self
    }
}
