use crate::{models::upload::UploadResult, services::upload_service::UploadError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use std::{any::Any, fmt, future::Future, panic::AssertUnwindSafe};

/// A failed request: the HTTP status plus the error code and message that
/// end up in the `UploadResult` failure body.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error_code: String,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status, code and message.
    pub fn new(status: StatusCode, error_code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            error_code: error_code.into(),
            message: msg.into(),
        }
    }

    /// Shortcut for a 400 `VALIDATION_ERROR`.
    pub fn validation(msg: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("request validation failed: {}", msg),
        )
    }

    /// Shortcut for a 500 with an endpoint-specific exception code.
    pub fn exception(error_code: &str, msg: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_code,
            format!("request failed unexpectedly: {}", msg),
        )
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

/// Status for a failure code. Unlisted codes, native S3 ones included, are 500.
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "CONFIGURATION_ERROR" => StatusCode::SERVICE_UNAVAILABLE,
        "INVALID_FILE_CONTENT" | "VALIDATION_ERROR" | "InvalidBucketName" => {
            StatusCode::BAD_REQUEST
        }
        "FILE_ALREADY_EXISTS" => StatusCode::CONFLICT,
        "FILE_NOT_FOUND" | "BUCKET_NOT_FOUND" | "NoSuchBucket" => StatusCode::NOT_FOUND,
        "AccessDenied" => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(UploadResult::failure(self.message, self.error_code));
        (self.status, body).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        let code = err.error_code().to_string();
        AppError::new(status_for_code(&code), code, err.to_string())
    }
}

/// Run `fut`, turning a panic inside it into a 500 carrying `error_code`.
pub async fn guard<F: Future>(error_code: &str, fut: F) -> Result<F::Output, AppError> {
    AssertUnwindSafe(fut).catch_unwind().await.map_err(|payload| {
        let msg = panic_message(payload.as_ref());
        tracing::error!("{} while handling request: {}", error_code, msg);
        AppError::exception(error_code, msg)
    })
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
