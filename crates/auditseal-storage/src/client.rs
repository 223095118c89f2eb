//! The S3-compatible operations the adapter relies on.

use async_trait::async_trait;
use auditseal_common_core::LockMode;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::StorageError;

/// Bucket-level Object Lock configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectLockConfiguration {
    /// `ObjectLockEnabled == "Enabled"`.
    pub enabled: bool,
    /// Default retention mode, if the bucket sets one.
    pub default_mode: Option<LockMode>,
}

/// Retention applied to a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRetention {
    pub mode: LockMode,
    pub retain_until: DateTime<Utc>,
}

/// `HeadObject` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub lock_mode: Option<LockMode>,
    pub retain_until: Option<DateTime<Utc>>,
}

/// S3-compatible object storage client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn get_object_lock_configuration(
        &self,
        bucket: &str,
    ) -> Result<ObjectLockConfiguration, StorageError>;

    async fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        retention: ObjectRetention,
    ) -> Result<(), StorageError>;

    async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectRetention, StorageError>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, StorageError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Time-limited GET URL for `bucket/key`.
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;
}
