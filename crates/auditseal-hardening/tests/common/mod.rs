#![allow(dead_code)]

use async_trait::async_trait;
use auditseal_common_config::AuditSealConfig;
use auditseal_common_core::{ExportId, OrganizationId};
use auditseal_common_secret::MemorySecretStore;
use auditseal_database::Database;
use auditseal_hardening::{AuditSystem, Collaborators, HardenRequest};
use auditseal_manifest::ExportType;
use auditseal_storage::{
    MemoryObjectFetcher, MemoryObjectStorage, ObjectHead, ObjectLockConfiguration,
    ObjectRetention, ObjectStorage, StorageError,
};
use auditseal_test_utils::tsa::respond_to;
use auditseal_timestamp::{TimestampError, TsaTransport};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BUCKET: &str = "audit-worm";

/// A Time-Stamp Authority answering every request with the current time.
#[derive(Default)]
pub struct SyntheticTsa {
    unavailable: AtomicBool,
    requests: AtomicUsize,
}

impl SyntheticTsa {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TsaTransport for SyntheticTsa {
    async fn send(&self, request: Vec<u8>) -> Result<Vec<u8>, TimestampError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TimestampError::Transport("connection refused".into()));
        }
        let gen_time = Utc::now().format("%Y%m%d%H%M%SZ").to_string();
        respond_to(&request, &gen_time)
            .ok_or_else(|| TimestampError::Malformed("request carries no SHA-256 imprint".into()))
    }

    fn endpoint(&self) -> String {
        "synthetic://tsa".to_string()
    }
}

/// A fully wired system over in-memory collaborators.
pub struct Harness {
    pub system: AuditSystem,
    pub storage: Arc<MemoryObjectStorage>,
    pub secrets: Arc<MemorySecretStore>,
    pub tsa: Arc<SyntheticTsa>,
    pub org: OrganizationId,
}

pub async fn harness() -> Harness {
    harness_with_lock(true).await
}

pub async fn harness_with_lock(object_lock: bool) -> Harness {
    let storage = Arc::new(MemoryObjectStorage::new().with_bucket(BUCKET, object_lock));
    harness_over(storage.clone(), storage).await
}

/// A harness whose pipeline talks to `object_storage`, backed by `storage`.
pub async fn harness_over(
    storage: Arc<MemoryObjectStorage>,
    object_storage: Arc<dyn ObjectStorage>,
) -> Harness {
    let secrets = Arc::new(MemorySecretStore::new());
    let tsa = Arc::new(SyntheticTsa::default());

    let mut config = AuditSealConfig::default();
    config.storage.bucket = BUCKET.to_string();
    config.tsa.retry_base_delay_ms = 1;

    let collaborators = Collaborators {
        object_storage,
        fetcher: Arc::new(MemoryObjectFetcher::new(storage.clone())),
        secrets: secrets.clone(),
        tsa: tsa.clone(),
    };
    let db = Database::in_memory().await.unwrap();
    let system = AuditSystem::new(&config, db, collaborators).unwrap();

    Harness {
        system,
        storage,
        secrets,
        tsa,
        org: OrganizationId::new(),
    }
}

impl Harness {
    pub fn request(&self, export_type: ExportType, archive: Vec<u8>) -> HardenRequest {
        HardenRequest {
            organization_id: self.org,
            export_id: ExportId::new(),
            export_type,
            archive,
        }
    }
}

/// Object storage that stores normally but cannot presign downloads.
pub struct PresignOutage(pub Arc<MemoryObjectStorage>);

#[async_trait]
impl ObjectStorage for PresignOutage {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.0.put_object(bucket, key, body, content_type).await
    }

    async fn get_object_lock_configuration(
        &self,
        bucket: &str,
    ) -> Result<ObjectLockConfiguration, StorageError> {
        self.0.get_object_lock_configuration(bucket).await
    }

    async fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        retention: ObjectRetention,
    ) -> Result<(), StorageError> {
        self.0.put_object_retention(bucket, key, retention).await
    }

    async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectRetention, StorageError> {
        self.0.get_object_retention(bucket, key).await
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, StorageError> {
        self.0.head_object(bucket, key).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.0.get_object(bucket, key).await
    }

    async fn presign_get(
        &self,
        _bucket: &str,
        _key: &str,
        _expires_in: Duration,
    ) -> Result<String, StorageError> {
        Err(StorageError::Service("presigner down".into()))
    }
}
