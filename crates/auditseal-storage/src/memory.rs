//! In-process object store with Object Lock semantics.
//!
//! Objects under an unexpired retention cannot be overwritten, and retention
//! can only be extended. Presigned URLs use the `memory://bucket/key` form and
//! are resolved by [`MemoryObjectFetcher`](crate::fetch::MemoryObjectFetcher).

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::client::{ObjectHead, ObjectLockConfiguration, ObjectRetention, ObjectStorage};
use crate::error::StorageError;

/// URL scheme of presigned memory URLs.
pub const MEMORY_SCHEME: &str = "memory";

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: String,
    retention: Option<ObjectRetention>,
}

#[derive(Debug, Default)]
struct Bucket {
    object_lock: bool,
    objects: HashMap<String, StoredObject>,
}

/// In-memory [`ObjectStorage`].
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    buckets: RwLock<HashMap<String, Bucket>>,
    reject_retention: AtomicBool,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bucket, with or without Object Lock.
    pub fn with_bucket(self, name: impl Into<String>, object_lock: bool) -> Self {
        self.buckets.write().insert(
            name.into(),
            Bucket {
                object_lock,
                objects: HashMap::new(),
            },
        );
        self
    }

    /// Make every `put_object_retention` fail, as a misconfigured IAM policy would.
    pub fn reject_retention(&self, reject: bool) {
        self.reject_retention.store(reject, Ordering::SeqCst);
    }

    /// Number of objects in `bucket`.
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .get(bucket)
            .map(|b| b.objects.len())
            .unwrap_or(0)
    }

    /// Overwrite an object's bytes, ignoring retention. Simulates tampering
    /// below the API, e.g. by someone with raw disk access.
    pub fn corrupt(&self, bucket: &str, key: &str, body: Vec<u8>) -> bool {
        let mut buckets = self.buckets.write();
        match buckets.get_mut(bucket).and_then(|b| b.objects.get_mut(key)) {
            Some(object) => {
                object.body = body;
                true
            }
            None => false,
        }
    }

    fn with_object<T>(
        &self,
        bucket: &str,
        key: &str,
        f: impl FnOnce(&StoredObject) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let buckets = self.buckets.read();
        let b = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;
        let object = b.objects.get(key).ok_or_else(|| StorageError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        f(object)
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write();
        let b = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;

        if let Some(existing) = b.objects.get(key) {
            if existing
                .retention
                .is_some_and(|r| r.retain_until > Utc::now())
            {
                return Err(StorageError::AccessDenied(format!(
                    "{bucket}/{key} is under retention"
                )));
            }
        }

        b.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                retention: None,
            },
        );
        Ok(())
    }

    async fn get_object_lock_configuration(
        &self,
        bucket: &str,
    ) -> Result<ObjectLockConfiguration, StorageError> {
        let buckets = self.buckets.read();
        let b = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;
        if !b.object_lock {
            return Err(StorageError::NoObjectLockConfiguration(bucket.to_string()));
        }
        Ok(ObjectLockConfiguration {
            enabled: true,
            default_mode: None,
        })
    }

    async fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        retention: ObjectRetention,
    ) -> Result<(), StorageError> {
        if self.reject_retention.load(Ordering::SeqCst) {
            return Err(StorageError::AccessDenied("s3:PutObjectRetention".into()));
        }

        let mut buckets = self.buckets.write();
        let b = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket(bucket.to_string()))?;
        if !b.object_lock {
            return Err(StorageError::Service(format!(
                "bucket {bucket} is missing Object Lock configuration"
            )));
        }
        let object = b.objects.get_mut(key).ok_or_else(|| StorageError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        if let Some(current) = object.retention {
            if retention.retain_until < current.retain_until {
                return Err(StorageError::AccessDenied(
                    "retention can only be extended".into(),
                ));
            }
        }
        object.retention = Some(retention);
        Ok(())
    }

    async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectRetention, StorageError> {
        self.with_object(bucket, key, |object| {
            object.retention.ok_or_else(|| StorageError::NoRetention {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, StorageError> {
        self.with_object(bucket, key, |object| {
            Ok(ObjectHead {
                content_length: object.body.len() as u64,
                content_type: Some(object.content_type.clone()),
                lock_mode: object.retention.map(|r| r.mode),
                retain_until: object.retention.map(|r| r.retain_until),
            })
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.with_object(bucket, key, |object| Ok(object.body.clone()))
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        self.with_object(bucket, key, |_| Ok(()))?;
        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(format!("{MEMORY_SCHEME}://{bucket}/{key}?expires={expires}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditseal_common_core::LockMode;
    use chrono::Duration as ChronoDuration;

    fn retention(days: i64) -> ObjectRetention {
        ObjectRetention {
            mode: LockMode::Governance,
            retain_until: Utc::now() + ChronoDuration::days(days),
        }
    }

    #[tokio::test]
    async fn test_lock_configuration_absent_is_not_found() {
        let store = MemoryObjectStorage::new().with_bucket("plain", false);
        let err = store.get_object_lock_configuration("plain").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_retained_object_cannot_be_overwritten() {
        let store = MemoryObjectStorage::new().with_bucket("worm", true);
        store.put_object("worm", "k", b"v1".to_vec(), "application/zip").await.unwrap();
        store.put_object_retention("worm", "k", retention(30)).await.unwrap();

        let err = store
            .put_object("worm", "k", b"v2".to_vec(), "application/zip")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AccessDenied(_)));
        assert_eq!(store.get_object("worm", "k").await.unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_retention_cannot_be_shortened() {
        let store = MemoryObjectStorage::new().with_bucket("worm", true);
        store.put_object("worm", "k", vec![1], "x").await.unwrap();
        store.put_object_retention("worm", "k", retention(30)).await.unwrap();
        assert!(store.put_object_retention("worm", "k", retention(1)).await.is_err());
        assert!(store.put_object_retention("worm", "k", retention(60)).await.is_ok());
    }

    #[tokio::test]
    async fn test_presign_requires_object() {
        let store = MemoryObjectStorage::new().with_bucket("b", false);
        assert!(store.presign_get("b", "missing", Duration::from_secs(60)).await.is_err());
        store.put_object("b", "a/b.zip", vec![1], "x").await.unwrap();
        let url = store.presign_get("b", "a/b.zip", Duration::from_secs(60)).await.unwrap();
        assert!(url.starts_with("memory://b/a/b.zip?expires="));
    }
}
