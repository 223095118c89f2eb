//! Delivery of DER requests to a Time-Stamp Authority.

use async_trait::async_trait;
use auditseal_common_http::{HttpClient, HttpConfig};
use std::time::Duration;

use crate::error::TimestampError;

pub const TIMESTAMP_QUERY: &str = "application/timestamp-query";
pub const TIMESTAMP_REPLY: &str = "application/timestamp-reply";

/// One round trip to a TSA.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TsaTransport: Send + Sync {
    /// Send a DER `TimeStampReq`, returning the DER `TimeStampResp`.
    async fn send(&self, request: Vec<u8>) -> Result<Vec<u8>, TimestampError>;

    /// Endpoint for logging.
    fn endpoint(&self) -> String;
}

/// RFC 3161 over HTTP POST.
pub struct HttpTsaTransport {
    client: HttpClient,
    url: String,
}

impl HttpTsaTransport {
    /// Transport for `url` with the given per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TimestampError> {
        let client = HttpClient::with_config(&HttpConfig::default().with_request_timeout(timeout))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TsaTransport for HttpTsaTransport {
    async fn send(&self, request: Vec<u8>) -> Result<Vec<u8>, TimestampError> {
        let body = self
            .client
            .post_bytes(&self.url, TIMESTAMP_QUERY, TIMESTAMP_REPLY, request)
            .await?;
        Ok(body.to_vec())
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}
