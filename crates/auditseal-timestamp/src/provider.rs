//! Timestamp acquisition with bounded retry.

use async_trait::async_trait;
use auditseal_crypto::Sha256Hash;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::error::TimestampError;
use crate::request::TimeStampRequest;
use crate::response::parse_response;
use crate::token::{verify_basic, BasicTimestampCheck, Rfc3161Timestamp};
use crate::transport::TsaTransport;

/// Attempts and linear backoff for TSA calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Sleep after failed attempt `n` is `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Trusted timestamping seam.
#[async_trait]
pub trait TimestampProvider: Send + Sync {
    /// Obtain a TSA timestamp over `hash`.
    async fn timestamp(&self, hash: &Sha256Hash) -> Result<Rfc3161Timestamp, TimestampError>;

    /// Best-effort check of a stored timestamp against `hash`.
    fn verify_basic(&self, timestamp: &Rfc3161Timestamp, hash: &Sha256Hash) -> BasicTimestampCheck {
        verify_basic(timestamp, hash, Utc::now())
    }
}

/// RFC 3161 provider over a [`TsaTransport`].
pub struct Rfc3161Provider {
    transport: Arc<dyn TsaTransport>,
    authority: String,
    retry: RetryPolicy,
}

impl Rfc3161Provider {
    pub fn new(transport: Arc<dyn TsaTransport>, authority: impl Into<String>) -> Self {
        Self {
            transport,
            authority: authority.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    async fn attempt(&self, hash: &Sha256Hash) -> Result<Rfc3161Timestamp, TimestampError> {
        let request = TimeStampRequest::new(*hash);
        let reply = self.transport.send(request.to_der()?).await?;
        let response = parse_response(&reply)?;
        if !response.contains_imprint(hash.as_bytes()) {
            return Err(TimestampError::ImprintMismatch);
        }
        Rfc3161Timestamp::from_der(&response.raw, response.gen_time, self.authority.clone())
    }
}

#[async_trait]
impl TimestampProvider for Rfc3161Provider {
    #[instrument(skip(self), fields(tsa = %self.transport.endpoint()))]
    async fn timestamp(&self, hash: &Sha256Hash) -> Result<Rfc3161Timestamp, TimestampError> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(hash).await {
                Ok(stamp) => {
                    info!(attempt, gen_time = %stamp.timestamp, "timestamp granted");
                    return Ok(stamp);
                }
                Err(err) if attempt < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "TSA attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "TSA attempts exhausted");
                    return Err(err);
                }
            }
        }
    }
}
