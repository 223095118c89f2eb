//! HTTP client configuration and binary request helpers.

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("auditseal/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 4,
        }
    }
}

impl HttpConfig {
    /// Same configuration with a different request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Build a configured HTTP client.
pub fn build_client(config: &HttpConfig) -> Result<Client, HttpError> {
    ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()
        .map_err(HttpError::ClientBuild)
}

/// HTTP errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("server error: {status}")]
    ServerError { status: u16, body: String },

    #[error("client error: {status}")]
    ClientError { status: u16, body: String },
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout
        } else {
            HttpError::Request(e)
        }
    }
}

impl HttpError {
    /// Not found responses are meaningful to callers probing optional resources.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::ClientError { status: 404, .. })
    }
}

/// Shared HTTP client.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    /// Create a new HTTP client with default config.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a new HTTP client with custom config.
    pub fn with_config(config: &HttpConfig) -> Result<Self, HttpError> {
        Ok(Self {
            inner: build_client(config)?,
        })
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// POST a binary body and return the binary response body.
    pub async fn post_bytes(
        &self,
        url: &str,
        content_type: &str,
        accept: &str,
        body: Vec<u8>,
    ) -> Result<Bytes, HttpError> {
        tracing::debug!(url, content_type, size = body.len(), "POST");
        let response = self
            .inner
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, accept)
            .body(body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let bytes = response.bytes().await?;
        tracing::debug!(url, size = bytes.len(), "POST response");
        Ok(bytes)
    }

    /// GET a resource as raw bytes.
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes, HttpError> {
        tracing::debug!(url, "GET");
        let response = self.inner.get(url).send().await?;
        let response = Self::check_response(response).await?;
        Ok(response.bytes().await?)
    }

    /// Check response status and convert errors.
    pub async fn check_response(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, HttpError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(HttpError::ServerError {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(HttpError::ClientError {
                status: status.as_u16(),
                body,
            })
        }
    }
}
