//! src/services/s3_client.rs
//!
//! `ObjectStorage` backed by the AWS SDK, plus the factory that turns
//! `S3Settings` into a shared client handle.

use crate::{
    config::S3Settings,
    models::listing::ObjectSummary,
    services::object_storage::{
        ObjectStorage, PutObject, PutReceipt, StorageError, StorageResult,
    },
};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Region, timeout::TimeoutConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    types::Object,
};
use chrono::{DateTime, Utc};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("incomplete S3 configuration, missing: {0}")]
    Incomplete(String),
    #[error("invalid endpoint url `{url}`: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Thin wrapper over `aws_sdk_s3::Client`; the SDK client is already cheap
/// to clone and safe to share.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
}

impl fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Storage").finish_non_exhaustive()
    }
}

impl S3Storage {
    /// Build a client from validated settings.
    ///
    /// No network I/O happens here; credentials are only checked on first use.
    pub fn connect(settings: &S3Settings) -> Result<Self, ClientBuildError> {
        if !settings.is_valid() {
            return Err(ClientBuildError::Incomplete(settings.missing_summary()));
        }

        let credentials = Credentials::new(
            settings.access_key.clone().unwrap_or_default(),
            settings.secret_key.clone().unwrap_or_default(),
            None,
            None,
            "S3UploadStaticCredentials",
        );

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(settings.connection_timeout())
            .read_timeout(settings.read_timeout())
            .build();

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.trim().to_string()))
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .force_path_style(settings.path_style_access);

        if let Some(endpoint) = settings.endpoint() {
            url::Url::parse(endpoint).map_err(|source| ClientBuildError::InvalidEndpoint {
                url: endpoint.to_string(),
                source,
            })?;
            info!("Using custom S3 endpoint {}", endpoint);
            builder = builder.endpoint_url(endpoint);
        }

        if settings.path_style_access {
            info!("Path-style S3 addressing enabled");
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }
}

/// Construct the shared storage handle, or `None` when the settings are
/// incomplete or the client cannot be built. Never panics.
pub fn create_storage(settings: &S3Settings) -> Option<Arc<dyn ObjectStorage>> {
    match S3Storage::connect(settings) {
        Ok(storage) => {
            info!(
                region = %settings.region,
                bucket = %settings.bucket(),
                path_style = settings.path_style_access,
                "S3 client initialized"
            );
            Some(Arc::new(storage))
        }
        Err(ClientBuildError::Incomplete(missing)) => {
            error!("S3 configuration incomplete, client not created. Missing: {}", missing);
            info!(
                "Set AWS_S3_ACCESS_KEY, AWS_S3_SECRET_KEY, AWS_S3_REGION, AWS_S3_BUCKET_NAME \
                 or the matching keys under `s3:` in the config file"
            );
            None
        }
        Err(err) => {
            error!("Failed to create S3 client: {}", err);
            None
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn head_bucket(&self, bucket: &str) -> StorageResult<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => {
                Err(StorageError::BucketNotFound(bucket.to_string()))
            }
            Err(err) => Err(sdk_error(err)),
        }
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(()),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => {
                Err(StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(err) => Err(sdk_error(err)),
        }
    }

    async fn put_object(&self, bucket: &str, object: PutObject) -> StorageResult<PutReceipt> {
        let length = object.body.len() as i64;
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(&object.key)
            .content_type(&object.content_type)
            .content_length(length)
            .content_md5(&object.content_md5)
            .body(ByteStream::from(object.body));

        for (name, value) in object.metadata {
            request = request.metadata(name, value);
        }

        let output = request.send().await.map_err(sdk_error)?;
        debug!("put {} ({} bytes)", object.key, length);

        Ok(PutReceipt {
            etag: output.e_tag().map(str::to_owned),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        max_keys: i32,
    ) -> StorageResult<Vec<ObjectSummary>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(max_keys)
            .set_prefix(prefix.map(str::to_owned))
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(output.contents().iter().map(summarize).collect())
    }
}

fn summarize(object: &Object) -> ObjectSummary {
    ObjectSummary {
        key: object.key().unwrap_or_default().to_string(),
        size: object.size().unwrap_or_default(),
        last_modified: object
            .last_modified()
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())),
        checksum: object.e_tag().map(str::to_owned),
        storage_class: object.storage_class().map(|class| class.as_str().to_string()),
    }
}

/// Keep the service's native error code when there is one; anything that
/// never reached the service becomes `Transport`.
fn sdk_error<E, R>(err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    if let Some(service_err) = err.as_service_error() {
        if let Some(code) = service_err.code() {
            return StorageError::Service {
                code: code.to_string(),
                message: service_err.message().unwrap_or_default().to_string(),
            };
        }
    }
    StorageError::Transport(DisplayErrorContext(&err).to_string())
}
