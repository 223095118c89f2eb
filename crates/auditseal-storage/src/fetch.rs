//! Downloading packages through presigned URLs.

use async_trait::async_trait;
use auditseal_common_http::HttpClient;
use chrono::Utc;
use std::sync::Arc;
use url::Url;

use crate::client::ObjectStorage;
use crate::error::StorageError;
use crate::memory::{MemoryObjectStorage, MEMORY_SCHEME};

/// Fetches the bytes behind a presigned URL.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError>;
}

/// Plain HTTP GET.
pub struct HttpObjectFetcher {
    client: HttpClient,
}

impl HttpObjectFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectFetcher for HttpObjectFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        Ok(self.client.get_bytes(url).await?.to_vec())
    }
}

/// Resolves `memory://bucket/key?expires=...` against a [`MemoryObjectStorage`].
pub struct MemoryObjectFetcher {
    storage: Arc<MemoryObjectStorage>,
}

impl MemoryObjectFetcher {
    pub fn new(storage: Arc<MemoryObjectStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ObjectFetcher for MemoryObjectFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let parsed = Url::parse(url).map_err(|_| StorageError::InvalidUrl(url.to_string()))?;
        if parsed.scheme() != MEMORY_SCHEME {
            return Err(StorageError::InvalidUrl(url.to_string()));
        }
        let bucket = parsed
            .host_str()
            .ok_or_else(|| StorageError::InvalidUrl(url.to_string()))?;
        let key = parsed.path().trim_start_matches('/');

        let expires = parsed
            .query_pairs()
            .find(|(name, _)| name == "expires")
            .and_then(|(_, value)| value.parse::<i64>().ok())
            .ok_or_else(|| StorageError::InvalidUrl(url.to_string()))?;
        if expires < Utc::now().timestamp() {
            return Err(StorageError::AccessDenied("presigned URL expired".into()));
        }

        self.storage.get_object(bucket, key).await
    }
}
