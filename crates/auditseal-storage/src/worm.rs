//! Write-once uploads with Object Lock retention.

use async_trait::async_trait;
use auditseal_common_core::{LockMode, OrganizationId, RetentionYears};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::client::{ObjectRetention, ObjectStorage};
use crate::error::StorageError;

/// Content type of uploaded packages.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Where an organization's packages go and how they are locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    pub bucket: String,
    pub lock_mode: LockMode,
}

/// Per-organization storage settings.
#[async_trait]
pub trait StorageTargetResolver: Send + Sync {
    async fn resolve(&self, organization_id: OrganizationId) -> Result<StorageTarget, StorageError>;
}

/// The same target for every organization.
#[derive(Debug, Clone)]
pub struct FixedStorageTarget(pub StorageTarget);

#[async_trait]
impl StorageTargetResolver for FixedStorageTarget {
    async fn resolve(
        &self,
        _organization_id: OrganizationId,
    ) -> Result<StorageTarget, StorageError> {
        Ok(self.0.clone())
    }
}

/// Result of [`WormStorageAdapter::upload_with_retention`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub bucket: String,
    pub key: String,
    /// Retention was applied to the object.
    pub object_lock_enabled: bool,
    /// `now + retention_years`, whether or not it is enforced by storage.
    pub retention_until: DateTime<Utc>,
    pub lock_mode: Option<LockMode>,
}

/// Result of [`WormStorageAdapter::verify_object_lock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    pub mode: Option<LockMode>,
    pub retain_until: Option<DateTime<Utc>>,
}

impl LockStatus {
    fn unlocked() -> Self {
        Self {
            locked: false,
            mode: None,
            retain_until: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedSupport {
    supported: bool,
    checked_at: Instant,
}

/// Uploads packages and manages their retention metadata.
pub struct WormStorageAdapter {
    client: Arc<dyn ObjectStorage>,
    targets: Arc<dyn StorageTargetResolver>,
    cache_ttl: Duration,
    lock_support: Mutex<HashMap<(OrganizationId, String), CachedSupport>>,
}

impl WormStorageAdapter {
    pub fn new(
        client: Arc<dyn ObjectStorage>,
        targets: Arc<dyn StorageTargetResolver>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            client,
            targets,
            cache_ttl,
            lock_support: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the organization's bucket has Object Lock enabled.
    ///
    /// Not-found errors mean "unsupported". The answer is cached per
    /// organization and bucket for the configured TTL.
    #[instrument(skip(self))]
    pub async fn check_object_lock_support(
        &self,
        organization_id: OrganizationId,
    ) -> Result<bool, StorageError> {
        let target = self.targets.resolve(organization_id).await?;
        let cache_key = (organization_id, target.bucket.clone());

        if let Some(cached) = self.lock_support.lock().get(&cache_key).copied() {
            if cached.checked_at.elapsed() < self.cache_ttl {
                return Ok(cached.supported);
            }
        }

        let supported = match self.client.get_object_lock_configuration(&target.bucket).await {
            Ok(config) => config.enabled,
            Err(err) if err.is_not_found() => {
                debug!(bucket = %target.bucket, error = %err, "object lock not configured");
                false
            }
            Err(err) => return Err(err),
        };

        self.lock_support.lock().insert(
            cache_key,
            CachedSupport {
                supported,
                checked_at: Instant::now(),
            },
        );
        Ok(supported)
    }

    /// Upload `data`, then apply retention when the bucket supports it.
    ///
    /// Once the object is stored, a failure to look up lock support or to
    /// apply retention is logged and reported through
    /// `object_lock_enabled = false`; the upload itself stands.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_with_retention(
        &self,
        organization_id: OrganizationId,
        key: &str,
        data: Vec<u8>,
        retention_years: RetentionYears,
    ) -> Result<UploadOutcome, StorageError> {
        let target = self.targets.resolve(organization_id).await?;
        self.client
            .put_object(&target.bucket, key, data, ZIP_CONTENT_TYPE)
            .await?;

        let retention_until = retention_years.add_to(Utc::now());
        let mut outcome = UploadOutcome {
            bucket: target.bucket.clone(),
            key: key.to_string(),
            object_lock_enabled: false,
            retention_until,
            lock_mode: None,
        };

        match self.check_object_lock_support(organization_id).await {
            Ok(true) => {}
            Ok(false) => {
                info!(bucket = %target.bucket, "uploaded without object lock");
                return Ok(outcome);
            }
            Err(err) => {
                warn!(
                    bucket = %target.bucket,
                    error = %err,
                    "object lock support unknown; object stored without lock"
                );
                return Ok(outcome);
            }
        }

        let retention = ObjectRetention {
            mode: target.lock_mode,
            retain_until: retention_until,
        };
        match self
            .client
            .put_object_retention(&target.bucket, key, retention)
            .await
        {
            Ok(()) => {
                info!(mode = target.lock_mode.as_s3_str(), %retention_until, "retention applied");
                outcome.object_lock_enabled = true;
                outcome.lock_mode = Some(target.lock_mode);
            }
            Err(err) => {
                warn!(error = %err, "failed to apply retention; object stored without lock");
            }
        }
        Ok(outcome)
    }

    /// Read back retention of `key`. Missing retention is `locked: false`.
    #[instrument(skip(self))]
    pub async fn verify_object_lock(
        &self,
        organization_id: OrganizationId,
        key: &str,
    ) -> Result<LockStatus, StorageError> {
        let target = self.targets.resolve(organization_id).await?;
        self.verify_object_lock_at(&target.bucket, key).await
    }

    /// [`Self::verify_object_lock`] for an object whose bucket is already known.
    pub async fn verify_object_lock_at(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<LockStatus, StorageError> {
        match self.client.get_object_retention(bucket, key).await {
            Ok(retention) => Ok(LockStatus {
                locked: retention.retain_until > Utc::now(),
                mode: Some(retention.mode),
                retain_until: Some(retention.retain_until),
            }),
            Err(err @ StorageError::NoSuchKey { .. }) => Err(err),
            Err(err) if err.is_not_found() => Ok(LockStatus::unlocked()),
            Err(err) => Err(err),
        }
    }

    /// Time-limited download URL.
    pub async fn presign_download(
        &self,
        organization_id: OrganizationId,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let target = self.targets.resolve(organization_id).await?;
        self.presign_download_at(&target.bucket, key, expires_in).await
    }

    pub async fn presign_download_at(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        self.client.presign_get(bucket, key, expires_in).await
    }

    /// Direct read of a stored object.
    pub async fn download(
        &self,
        organization_id: OrganizationId,
        key: &str,
    ) -> Result<Vec<u8>, StorageError> {
        let target = self.targets.resolve(organization_id).await?;
        self.client.get_object(&target.bucket, key).await
    }
}
