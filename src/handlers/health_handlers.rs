//! Health & readiness handlers.
//!
//! - GET /healthz        -> simple liveness ("ok")
//! - GET /readyz         -> readiness: configuration complete and bucket reachable
//! - GET /api/s3/health  -> always 200, reports storage connectivity in the body

use crate::{errors::guard, services::upload_service::UploadService};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

const SERVICE_NAME: &str = "s3-upload-service";

/// `GET /healthz`
///
/// Very small liveness probe: always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(LivenessResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Checks the S3 settings are complete and a client was built.
/// 2. Heads the configured bucket.
///
/// HTTP 200 when all checks pass, HTTP 503 when any check fails.
pub async fn readyz(State(service): State<UploadService>) -> impl IntoResponse {
    let configuration_check = if service.is_configured() {
        CheckStatus::ok()
    } else {
        CheckStatus::failed("S3 client not configured")
    };

    let bucket_check = match guard("INTERNAL_ERROR", service.test_connection()).await {
        Ok(Ok(_)) => CheckStatus::ok(),
        Ok(Err(err)) => CheckStatus::failed(err.to_string()),
        Err(err) => CheckStatus::failed(err.message),
    };

    let overall_ok = configuration_check.ok && bucket_check.ok;

    let mut checks = HashMap::new();
    checks.insert("configuration", configuration_check);
    checks.insert("bucket", bucket_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// `GET /api/s3/health`
///
/// The process is up if it can answer; storage connectivity is reported
/// alongside rather than through the status code.
pub async fn health(State(service): State<UploadService>) -> impl IntoResponse {
    tracing::debug!("Received health check request");

    let s3_error = match guard("INTERNAL_ERROR", service.test_connection()).await {
        Ok(Ok(_)) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(err) => Some(err.message),
    };

    Json(HealthResponse {
        status: "UP".into(),
        timestamp: Utc::now(),
        service: SERVICE_NAME.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        s3_connection: if s3_error.is_none() { "UP" } else { "DOWN" }.into(),
        s3_error,
    })
}

#[derive(Serialize)]
struct LivenessResponse {
    status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    timestamp: DateTime<Utc>,
    service: String,
    version: String,
    s3_connection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    s3_error: Option<String>,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}
