use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::{env, fmt, time::Duration};

/// `s3.*` settings that are free text. The `Env` provider would parse a
/// digit-only value into a number and drop leading zeros, so these are read
/// verbatim instead.
const TEXT_SETTINGS: [&str; 5] = [
    "access_key",
    "secret_key",
    "region",
    "bucket_name",
    "endpoint_url",
];

/// Centralized application configuration.
/// Layers defaults, the YAML file, environment variables and CLI arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub s3: S3Settings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            s3: S3Settings::default(),
        }
    }
}

/// Command-line configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "REST upload facade over S3-compatible storage")]
pub struct Args {
    /// YAML configuration file (missing file is ignored)
    #[arg(long, default_value = "s3-upload.yaml")]
    pub config: String,

    /// Host to bind to (overrides S3_UPLOAD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides S3_UPLOAD_PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

impl AppConfig {
    /// Parse CLI args, then load and merge every other source.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        let mut cfg = Self::load(&args.config)
            .with_context(|| format!("loading configuration from `{}`", args.config))?;

        if let Some(host) = args.host {
            cfg.host = host;
        }
        if let Some(port) = args.port {
            cfg.port = port;
        }

        Ok(cfg)
    }

    pub fn load(path: &str) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Sources in increasing priority: defaults, YAML file, environment.
    pub fn figment(path: &str) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("S3_UPLOAD_").only(&["host", "port"]))
            .merge(
                Env::prefixed("AWS_S3_")
                    .ignore(&TEXT_SETTINGS)
                    .map(|key| format!("s3.{}", key).into()),
            );

        for name in TEXT_SETTINGS {
            if let Ok(value) = env::var(format!("AWS_S3_{}", name.to_ascii_uppercase())) {
                figment = figment.merge(Serialized::default(&format!("s3.{}", name), value));
            }
        }
        figment
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection settings for the object-storage backend.
///
/// Required fields are optional here so that an incomplete configuration can
/// still be loaded and reported instead of aborting startup.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    #[serde(deserialize_with = "optional_text")]
    pub access_key: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub secret_key: Option<String>,
    #[serde(deserialize_with = "text")]
    pub region: String,
    #[serde(deserialize_with = "optional_text")]
    pub bucket_name: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, OSS, R2...).
    #[serde(deserialize_with = "optional_text")]
    pub endpoint_url: Option<String>,
    pub path_style_access: bool,
    pub connection_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            region: "us-east-1".into(),
            bucket_name: None,
            endpoint_url: None,
            path_style_access: false,
            connection_timeout_ms: 30_000,
            read_timeout_ms: 60_000,
        }
    }
}

impl S3Settings {
    pub fn is_valid(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Human-readable names of every required setting that is unset or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(self.access_key.as_deref()) {
            missing.push("access key (s3.access_key or AWS_S3_ACCESS_KEY)");
        }
        if is_blank(self.secret_key.as_deref()) {
            missing.push("secret key (s3.secret_key or AWS_S3_SECRET_KEY)");
        }
        if is_blank(self.bucket_name.as_deref()) {
            missing.push("bucket name (s3.bucket_name or AWS_S3_BUCKET_NAME)");
        }
        if self.region.trim().is_empty() {
            missing.push("region (s3.region or AWS_S3_REGION)");
        }
        missing
    }

    pub fn missing_summary(&self) -> String {
        self.missing_fields().join("; ")
    }

    pub fn bucket(&self) -> &str {
        self.bucket_name.as_deref().unwrap_or_default()
    }

    /// The custom endpoint, if one is configured and non-blank.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("access_key", &self.access_key.as_ref().map(|_| "<set>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("bucket_name", &self.bucket_name)
            .field("endpoint_url", &self.endpoint_url)
            .field("path_style_access", &self.path_style_access)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .finish()
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// A scalar where text is expected; YAML `bucket_name: 12345` arrives as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

fn optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<Scalar>::deserialize(deserializer).map(|value| value.map(String::from))
}
