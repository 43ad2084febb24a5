//! Defines routes for the upload API and the operational probes.
//!
//! ## Structure
//! - **Probes** (mounted at root)
//!   - `GET    /healthz`: liveness
//!   - `GET    /readyz`: readiness (configuration + bucket reachable)
//!
//! - **API** (under `/api/s3`)
//!   - `GET    /test-connection`: head the configured bucket
//!   - `POST   /upload`: store a Base64 payload
//!   - `DELETE /delete/{*key}`: delete an object
//!   - `GET    /list`: list objects (supports prefix, maxKeys)
//!   - `GET    /health`: process status plus storage connectivity
//!
//! The wildcard `*key` allows nested keys like `uploads/2025/01/02/x_img.jpg`,
//! sent either raw or with `/` percent-encoded.

use crate::{
    errors::{AppError, panic_message},
    handlers::{
        health_handlers::{health, healthz, readyz},
        upload_handlers::{delete_file, list_files, test_connection, upload_file},
    },
    services::upload_service::UploadService,
};
use axum::{
    Router,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

pub const API_PREFIX: &str = "/api/s3";

/// Build and return the router for all routes.
///
/// The router carries shared state (`UploadService`) to all handlers.
pub fn routes() -> Router<UploadService> {
    let api = Router::new()
        .route("/test-connection", get(test_connection))
        .route("/upload", post(upload_file))
        .route("/delete/{*key}", delete(delete_file))
        .route("/list", get(list_files))
        .route("/health", get(health));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .nest(API_PREFIX, api)
}

/// The complete application: routes, middleware and state.
pub fn app(service: UploadService) -> Router {
    with_middleware(routes()).with_state(service)
}

fn with_middleware<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// Last-resort boundary for panics that escape a handler's own guard.
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let msg = panic_message(payload.as_ref());
    tracing::error!("Unhandled panic while processing request: {}", msg);
    AppError::exception("INTERNAL_ERROR", msg).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::S3Settings,
        services::memory_storage::{Call, MemoryStorage},
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use base64::{Engine as _, engine::general_purpose};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use uuid::Uuid;

    const BUCKET: &str = "test-bucket";

    fn settings() -> S3Settings {
        S3Settings {
            access_key: Some("key".into()),
            secret_key: Some("secret".into()),
            bucket_name: Some(BUCKET.into()),
            ..S3Settings::default()
        }
    }

    fn server_with(storage: Arc<MemoryStorage>) -> TestServer {
        TestServer::new(app(UploadService::new(settings(), Some(storage)))).unwrap()
    }

    fn unconfigured_server() -> TestServer {
        TestServer::new(app(UploadService::new(S3Settings::default(), None))).unwrap()
    }

    #[tokio::test]
    async fn upload_returns_created_with_dated_key() {
        let storage = Arc::new(MemoryStorage::new(BUCKET));
        let server = server_with(storage.clone());

        let response = server
            .post("/api/s3/upload")
            .json(&json!({
                "fileContent": general_purpose::STANDARD.encode("hello"),
                "fileName": "a.txt"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["contentType"], "text/plain");
        assert_eq!(body["fileSize"], 5);
        assert_eq!(body["bucketName"], BUCKET);

        let key = body["s3Key"].as_str().unwrap();
        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "uploads");
        assert_eq!(parts[1].len(), 4);
        assert_eq!(parts[2].len(), 2);
        assert_eq!(parts[3].len(), 2);
        assert!(parts[1..4].iter().all(|p| p.chars().all(|c| c.is_ascii_digit())));
        let token = parts[4].strip_suffix("_a.txt").unwrap();
        assert!(Uuid::parse_str(token).is_ok());

        assert!(
            body["fileUrl"]
                .as_str()
                .unwrap()
                .starts_with("https://test-bucket.s3.us-east-1.amazonaws.com/uploads%2F")
        );
        assert!(storage.get(key).is_some());
    }

    #[tokio::test]
    async fn upload_rejects_invalid_base64() {
        let storage = Arc::new(MemoryStorage::new(BUCKET));
        let server = server_with(storage.clone());

        let response = server
            .post("/api/s3/upload")
            .json(&json!({ "fileContent": "%%%", "fileName": "a.txt" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["errorCode"], "INVALID_FILE_CONTENT");
        assert_eq!(storage.len(), 0);
    }

    #[tokio::test]
    async fn upload_validates_required_fields() {
        let server = server_with(Arc::new(MemoryStorage::new(BUCKET)));

        let response = server
            .post("/api/s3/upload")
            .json(&json!({ "fileContent": "aGVsbG8=", "fileName": "  " }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().contains("fileName"));
    }

    #[tokio::test]
    async fn upload_rejects_malformed_body() {
        let server = server_with(Arc::new(MemoryStorage::new(BUCKET)));

        let response = server.post("/api/s3/upload").text("{not json").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn upload_maps_access_denied_to_forbidden() {
        let storage = Arc::new(MemoryStorage::new(BUCKET));
        storage.fail(Call::Put, "AccessDenied");
        let server = server_with(storage);

        let response = server
            .post("/api/s3/upload")
            .json(&json!({ "fileContent": "aGVsbG8=", "fileName": "a.txt" }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "AccessDenied");
    }

    #[tokio::test]
    async fn upload_conflict_is_reported_as_409() {
        let storage = Arc::new(MemoryStorage::new(BUCKET));
        storage.report_everything_present();
        let server = server_with(storage.clone());

        let response = server
            .post("/api/s3/upload")
            .json(&json!({
                "fileContent": general_purpose::STANDARD.encode("hello"),
                "fileName": "a.txt"
            }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "FILE_ALREADY_EXISTS");
        assert_eq!(storage.put_count(), 0);
    }

    #[tokio::test]
    async fn upload_without_configuration_is_unavailable() {
        let server = unconfigured_server();

        let response = server
            .post("/api/s3/upload")
            .json(&json!({ "fileContent": "aGVsbG8=", "fileName": "a.txt" }))
            .await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn delete_unknown_key_is_not_found() {
        let server = server_with(Arc::new(MemoryStorage::new(BUCKET)));

        let response = server.delete("/api/s3/delete/unknown-key").await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["errorCode"], "FILE_NOT_FOUND");
    }

    #[tokio::test]
    async fn delete_accepts_encoded_and_nested_keys() {
        let storage = Arc::new(MemoryStorage::new(BUCKET));
        storage.insert("docs/a.txt", b"a");
        storage.insert("docs/b.txt", b"b");
        let server = server_with(storage.clone());

        let response = server.delete("/api/s3/delete/docs%2Fa.txt").await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["s3Key"], "docs/a.txt");
        assert_eq!(body["bucketName"], BUCKET);

        server
            .delete("/api/s3/delete/docs/b.txt")
            .await
            .assert_status(StatusCode::OK);
        assert_eq!(storage.len(), 0);
    }

    #[tokio::test]
    async fn list_returns_summaries() {
        let storage = Arc::new(MemoryStorage::new(BUCKET));
        storage.insert("img/1.png", b"one");
        storage.insert("img/2.png", b"two");
        storage.insert("img/3.png", b"three");
        storage.insert("docs/readme.txt", b"x");
        let server = server_with(storage);

        let response = server.get("/api/s3/list?prefix=img/&maxKeys=2").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["totalCount"], 2);
        let files = body["files"].as_array().unwrap();
        assert_eq!(files[0]["key"], "img/1.png");
        assert_eq!(files[0]["size"], 3);
        assert!(files[0]["checksum"].is_string());
        assert_eq!(files[0]["storageClass"], "STANDARD");
        assert!(files[0]["lastModified"].is_string());
    }

    #[tokio::test]
    async fn list_defaults_to_fifty() {
        let storage = Arc::new(MemoryStorage::new(BUCKET));
        for i in 0..60 {
            storage.insert(&format!("k/{:02}", i), b"");
        }
        let server = server_with(storage);

        let body: Value = server.get("/api/s3/list").await.json();
        assert_eq!(body["totalCount"], 50);
    }

    #[tokio::test]
    async fn list_treats_empty_max_keys_as_default() {
        let storage = Arc::new(MemoryStorage::new(BUCKET));
        for i in 0..60 {
            storage.insert(&format!("k/{:02}", i), b"");
        }
        let server = server_with(storage);

        let response = server.get("/api/s3/list?prefix=&maxKeys=").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["totalCount"], 50);
    }

    #[tokio::test]
    async fn list_rejects_non_numeric_max_keys() {
        let server = server_with(Arc::new(MemoryStorage::new(BUCKET)));

        let response = server.get("/api/s3/list?maxKeys=lots").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn list_without_configuration_is_structured_failure() {
        let response = unconfigured_server().get("/api/s3/list").await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_connection_succeeds() {
        let server = server_with(Arc::new(MemoryStorage::new(BUCKET)));

        let response = server.get("/api/s3/test-connection").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["bucketName"], BUCKET);
    }

    #[tokio::test]
    async fn test_connection_failures_are_unavailable() {
        let server = server_with(Arc::new(MemoryStorage::new("another-bucket")));
        let response = server.get("/api/s3/test-connection").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "BUCKET_NOT_FOUND");

        let response = unconfigured_server().get("/api/s3/test-connection").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let body: Value = server_with(Arc::new(MemoryStorage::new(BUCKET)))
            .get("/api/s3/health")
            .await
            .json();
        assert_eq!(body["status"], "UP");
        assert_eq!(body["s3Connection"], "UP");
        assert!(body.get("s3Error").is_none());

        let response = unconfigured_server().get("/api/s3/health").await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "UP");
        assert_eq!(body["s3Connection"], "DOWN");
        assert!(body["s3Error"].is_string());
    }

    #[tokio::test]
    async fn probes_reflect_storage_state() {
        let server = server_with(Arc::new(MemoryStorage::new(BUCKET)));
        server.get("/healthz").await.assert_status(StatusCode::OK);
        server.get("/readyz").await.assert_status(StatusCode::OK);

        let server = unconfigured_server();
        server.get("/healthz").await.assert_status(StatusCode::OK);
        let response = server.get("/readyz").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = response.json();
        assert_eq!(body["checks"]["configuration"]["ok"], false);
    }

    async fn exploding() -> &'static str {
        let state: Option<&'static str> = None;
        state.expect("handler state missing")
    }

    #[tokio::test]
    async fn unguarded_panic_becomes_internal_error() {
        let router = with_middleware(Router::new().route("/boom", get(exploding)));
        let server = TestServer::new(router).unwrap();

        let response = server.get("/boom").await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["errorCode"], "INTERNAL_ERROR");
        assert_eq!(body["success"], false);
    }
}
