//! HTTP handlers for upload, delete, list and connection-test operations.
//! Request shape is validated here; storage concerns are delegated to
//! `UploadService`.

use crate::{
    errors::{AppError, guard},
    models::{
        listing::ListFilesResponse,
        upload::{UploadRequest, UploadResult},
    },
    services::upload_service::{StoredFile, UploadService},
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Deserializer, de};
use tracing::{info, warn};

const DEFAULT_MAX_KEYS: i64 = 50;

/// Query params accepted by `GET /api/s3/list`.
#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    pub prefix: Option<String>,
    #[serde(rename = "maxKeys", default, deserialize_with = "empty_as_none")]
    pub max_keys: Option<i64>,
}

/// `maxKeys=` means "use the default"; anything else must parse.
fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|err| de::Error::custom(format!("maxKeys: {}", err))),
    }
}

impl ListFilesQuery {
    /// Requested page size, defaulting to 50 and clamped to `0..=1000`.
    fn page_size(&self) -> usize {
        self.max_keys.unwrap_or(DEFAULT_MAX_KEYS).clamp(0, 1000) as usize
    }
}

/// `GET /api/s3/test-connection`: 503 on any failure.
pub async fn test_connection(
    State(service): State<UploadService>,
) -> Result<impl IntoResponse, AppError> {
    info!("Received connection test request");

    let bucket = guard("TEST_EXCEPTION", service.test_connection())
        .await?
        .map_err(|err| {
            warn!("Connection test failed: {}", err);
            AppError::from(err).with_status(StatusCode::SERVICE_UNAVAILABLE)
        })?;

    Ok(Json(
        UploadResult::ok("S3 connection test succeeded").with_bucket(bucket),
    ))
}

/// `POST /api/s3/upload`: 201 with the stored object's key and URL.
pub async fn upload_file(
    State(service): State<UploadService>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Malformed upload body: {}", rejection.body_text());
        AppError::validation(rejection.body_text())
    })?;
    request.validate().map_err(|msg| {
        warn!("Upload request rejected: {}", msg);
        AppError::validation(msg)
    })?;

    info!(
        "Received upload request: file_name={}, prefix={:?}",
        request.file_name, request.path_prefix
    );

    let stored = guard("UPLOAD_EXCEPTION", service.upload_file(&request))
        .await?
        .inspect_err(|err| warn!("Upload failed: {}", err))?;

    info!("Upload succeeded: {}", stored.key);
    Ok((StatusCode::CREATED, Json(stored_result(stored))))
}

/// `DELETE /api/s3/delete/{*key}`: the key may contain encoded or raw `/`.
pub async fn delete_file(
    State(service): State<UploadService>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if key.trim().is_empty() {
        return Err(AppError::validation("key: must not be blank"));
    }
    info!("Received delete request: {}", key);

    let deleted = guard("DELETE_EXCEPTION", service.delete_file(&key))
        .await?
        .inspect_err(|err| warn!("Delete of {} failed: {}", key, err))?;

    Ok(Json(
        UploadResult::ok("file deleted")
            .with_key(deleted)
            .with_bucket(service.bucket()),
    ))
}

/// `GET /api/s3/list?prefix=&maxKeys=`: a single page of object summaries.
pub async fn list_files(
    State(service): State<UploadService>,
    query: Result<Query<ListFilesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(q) = query.map_err(|rejection| AppError::validation(rejection.body_text()))?;
    let max_keys = q.page_size();
    info!(
        "Received list request: prefix={:?}, max_keys={}",
        q.prefix, max_keys
    );

    let files = guard("LIST_EXCEPTION", service.list_files(q.prefix.as_deref(), max_keys))
        .await?
        .inspect_err(|err| warn!("Listing failed: {}", err))?;

    Ok(Json(ListFilesResponse::new(files)))
}

fn stored_result(stored: StoredFile) -> UploadResult {
    UploadResult {
        file_url: Some(stored.url),
        file_size: Some(stored.size),
        content_type: Some(stored.content_type),
        ..UploadResult::ok("file uploaded")
            .with_key(stored.key)
            .with_bucket(stored.bucket)
    }
}
