//! Read-only projection of listed objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single object returned by a bucket listing.
///
/// Mirrors the fields S3 reports in `ListObjectsV2` `<Contents>`; the
/// payload itself is never fetched.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes.
    pub size: i64,

    /// Timestamp when object was last modified.
    pub last_modified: Option<DateTime<Utc>>,

    /// ETag reported by the store, usually the MD5 of the payload.
    pub checksum: Option<String>,

    /// Storage class (e.g., STANDARD, GLACIER).
    pub storage_class: Option<String>,
}

/// Body of a successful `GET /api/s3/list`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesResponse {
    pub success: bool,
    pub message: String,
    pub total_count: usize,
    pub files: Vec<ObjectSummary>,
}

impl ListFilesResponse {
    pub fn new(files: Vec<ObjectSummary>) -> Self {
        Self {
            success: true,
            message: "file list retrieved".into(),
            total_count: files.len(),
            files,
        }
    }
}
