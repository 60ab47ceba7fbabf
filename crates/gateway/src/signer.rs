use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;

use crate::sigv4::{self, Credentials, SigningScope};

/// How long a signed asset URL stays valid.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(10 * 60);

const SERVICE: &str = "s3";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("asset key must not be empty")]
    EmptyKey,
    #[error("invalid asset endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Produces short-lived download links for stored assets.
pub trait AssetSigner: Send + Sync {
    fn presign_get(&self, object_key: &str) -> Result<String, SigningError>;
}

#[derive(Debug, Clone)]
pub struct S3PresignerConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    pub path_style: bool,
    pub credentials: Credentials,
}

#[derive(Debug, Clone)]
pub struct S3Presigner {
    bucket: String,
    region: String,
    scheme: String,
    endpoint_host: String,
    path_style: bool,
    credentials: Credentials,
    expires_in: Duration,
}

impl S3Presigner {
    pub fn new(config: S3PresignerConfig) -> Result<Self, SigningError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|err| SigningError::InvalidEndpoint(format!("{}: {}", config.endpoint, err)))?;

        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(SigningError::InvalidEndpoint(format!(
                "{}: scheme must be http or https",
                config.endpoint
            )));
        }
        if endpoint.path() != "/" || endpoint.query().is_some() {
            return Err(SigningError::InvalidEndpoint(format!(
                "{}: endpoint must not carry a path or query",
                config.endpoint
            )));
        }
        let host = endpoint.host_str().ok_or_else(|| {
            SigningError::InvalidEndpoint(format!("{}: missing host", config.endpoint))
        })?;
        let endpoint_host = match endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            bucket: config.bucket,
            region: config.region,
            scheme: endpoint.scheme().to_string(),
            endpoint_host,
            path_style: config.path_style,
            credentials: config.credentials,
            expires_in: SIGNED_URL_TTL,
        })
    }

    /// Presign as of `now`, valid for `expires_in`.
    pub fn presign_get_at(
        &self,
        object_key: &str,
        now: DateTime<Utc>,
        expires_in: Duration,
    ) -> Result<String, SigningError> {
        if object_key.is_empty() {
            return Err(SigningError::EmptyKey);
        }

        let encoded_key = sigv4::uri_encode(object_key, false);
        let (host, path) = if self.path_style {
            (
                self.endpoint_host.clone(),
                format!("/{}/{}", sigv4::uri_encode(&self.bucket, true), encoded_key),
            )
        } else {
            (
                format!("{}.{}", self.bucket, self.endpoint_host),
                format!("/{}", encoded_key),
            )
        };

        let scope = SigningScope::new(&self.region, SERVICE, now);
        let query = sigv4::presign_query(&self.credentials, &scope, &host, &path, expires_in);

        Ok(format!("{}://{}{}?{}", self.scheme, host, path, query))
    }
}

impl AssetSigner for S3Presigner {
    fn presign_get(&self, object_key: &str) -> Result<String, SigningError> {
        self.presign_get_at(object_key, Utc::now(), self.expires_in)
    }
}
