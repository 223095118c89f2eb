//! Composition root.

use auditseal_common_config::AuditSealConfig;
use auditseal_common_core::{
    AuditError, LockMode, OrganizationId, PackageId, Result, RetentionYears,
};
use auditseal_common_http::HttpClient;
use auditseal_common_secret::SecretStore;
use auditseal_crypto::{Ed25519Signer, HashProvider, Sha256Hasher, SigningProvider};
use auditseal_database::{
    AuditConfigRecord, Database, PackageFileRecord, PackageRecord, PoolConfig, SigningKeyRecord,
    VerificationLogRecord, VerificationRequester,
};
use auditseal_keys::{KeyManager, SigningService};
use auditseal_manifest::ManifestBuilder;
use auditseal_storage::{HttpObjectFetcher, ObjectFetcher, ObjectStorage, WormStorageAdapter};
use auditseal_timestamp::{
    HttpTsaTransport, Rfc3161Provider, RetryPolicy, TimestampService, TsaTransport,
};
use std::sync::Arc;
use tracing::info;

use crate::orchestrator::{HardenRequest, HardenedExport, HardeningOrchestrator, HardeningSettings};
use crate::targets::ConfigTargetResolver;
use crate::verification::{VerificationResult, VerificationService};

/// External systems the pipeline talks to.
pub struct Collaborators {
    pub object_storage: Arc<dyn ObjectStorage>,
    pub fetcher: Arc<dyn ObjectFetcher>,
    pub secrets: Arc<dyn SecretStore>,
    pub tsa: Arc<dyn TsaTransport>,
}

impl Collaborators {
    /// HTTP TSA from `config.tsa` and HTTP downloads of presigned URLs.
    pub fn with_http(
        config: &AuditSealConfig,
        object_storage: Arc<dyn ObjectStorage>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        let tsa = HttpTsaTransport::new(config.tsa.url.clone(), config.tsa.timeout())?;
        let client = HttpClient::new()
            .map_err(|e| AuditError::external("http", "build_client", e.to_string()))?;
        Ok(Self {
            object_storage,
            fetcher: Arc::new(HttpObjectFetcher::new(client)),
            secrets,
            tsa: Arc::new(tsa),
        })
    }
}

/// Every service, wired once.
pub struct AuditSystem {
    db: Database,
    keys: Arc<KeyManager>,
    orchestrator: HardeningOrchestrator,
    verification: VerificationService,
    settings: HardeningSettings,
}

impl AuditSystem {
    /// Open the configured database and wire the services.
    pub async fn connect(config: &AuditSealConfig, collaborators: Collaborators) -> Result<Self> {
        let pool = PoolConfig::new(config.database.path.to_string_lossy().into_owned())
            .with_max_connections(config.database.max_connections);
        let db = Database::connect(pool).await?;
        Self::new(config, db, collaborators)
    }

    pub fn new(
        config: &AuditSealConfig,
        db: Database,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let settings = HardeningSettings {
            key_prefix: config.storage.key_prefix.clone(),
            presign_ttl: config.storage.presign_ttl(),
            default_retention: RetentionYears::new(config.retention.default_years)?,
            default_lock_mode: config.retention.default_lock_mode,
        };

        let hasher: Arc<dyn HashProvider> = Arc::new(Sha256Hasher);
        let signer: Arc<dyn SigningProvider> = Arc::new(Ed25519Signer);
        let keys = Arc::new(KeyManager::new(
            signer.clone(),
            collaborators.secrets,
            db.signing_keys(),
        ));
        let signing = SigningService::new(signer, keys.clone());

        let provider = Rfc3161Provider::new(collaborators.tsa, config.tsa.authority.clone())
            .with_retry(RetryPolicy {
                max_attempts: config.tsa.max_attempts,
                base_delay: config.tsa.retry_base_delay(),
            });
        let timestamps = TimestampService::new(Arc::new(provider));

        let targets = Arc::new(ConfigTargetResolver::new(
            db.configs(),
            config.storage.bucket.clone(),
            settings.default_retention,
            settings.default_lock_mode,
        ));
        let storage = Arc::new(WormStorageAdapter::new(
            collaborators.object_storage,
            targets,
            config.storage.lock_cache_ttl(),
        ));

        let orchestrator = HardeningOrchestrator::new(
            db.configs(),
            db.packages(),
            ManifestBuilder::new(hasher.clone()),
            signing.clone(),
            timestamps.clone(),
            storage.clone(),
            settings.clone(),
        );
        let verification = VerificationService::new(
            db.packages(),
            db.verification_logs(),
            hasher,
            signing,
            timestamps,
            storage,
            collaborators.fetcher,
            settings.presign_ttl,
        );

        info!(
            tsa = %config.tsa.url,
            bucket = %config.storage.bucket,
            default_retention = settings.default_retention.get(),
            "audit system ready"
        );
        Ok(Self {
            db,
            keys,
            orchestrator,
            verification,
            settings,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn key_manager(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub async fn harden_export(&self, request: HardenRequest) -> Result<HardenedExport> {
        self.orchestrator.harden_export(request).await
    }

    pub async fn verify_package(
        &self,
        package_id: PackageId,
        organization_id: OrganizationId,
        requester: VerificationRequester,
    ) -> Result<VerificationResult> {
        self.verification
            .verify_package(package_id, organization_id, requester)
            .await
    }

    pub async fn get_package(
        &self,
        package_id: PackageId,
        organization_id: OrganizationId,
    ) -> Result<PackageRecord> {
        self.db
            .packages()
            .get_for_organization(package_id, organization_id)
            .await?
            .ok_or_else(|| AuditError::not_found("package", package_id))
    }

    /// Newest first.
    pub async fn list_packages(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<PackageRecord>> {
        Ok(self.db.packages().list_for_organization(organization_id).await?)
    }

    /// Stored file rows in Merkle order.
    pub async fn package_files(
        &self,
        package_id: PackageId,
        organization_id: OrganizationId,
    ) -> Result<Vec<PackageFileRecord>> {
        let package = self.get_package(package_id, organization_id).await?;
        Ok(self.db.packages().files(package.id).await?)
    }

    pub async fn verification_history(
        &self,
        package_id: PackageId,
        organization_id: OrganizationId,
    ) -> Result<Vec<VerificationLogRecord>> {
        let logs = self.db.verification_logs().for_package(package_id).await?;
        Ok(logs
            .into_iter()
            .filter(|log| log.organization_id == organization_id)
            .collect())
    }

    /// The organization's settings, created with defaults on first use.
    pub async fn audit_config(&self, organization_id: OrganizationId) -> Result<AuditConfigRecord> {
        Ok(self
            .db
            .configs()
            .get_or_create(
                organization_id,
                self.settings.default_retention,
                self.settings.default_lock_mode,
            )
            .await?)
    }

    /// Replace the organization's settings. Retention must be 1 to 10 years.
    pub async fn update_audit_config(
        &self,
        organization_id: OrganizationId,
        retention_years: u32,
        lock_mode: LockMode,
        bucket: Option<&str>,
    ) -> Result<AuditConfigRecord> {
        let retention_years = RetentionYears::new(retention_years)?;
        let bucket = bucket.map(str::trim).filter(|b| !b.is_empty());
        let config = self
            .db
            .configs()
            .upsert(organization_id, retention_years, lock_mode, bucket)
            .await?;
        info!(
            %organization_id,
            years = retention_years.get(),
            mode = %lock_mode,
            "audit config updated"
        );
        Ok(config)
    }

    pub async fn rotate_key(&self, organization_id: OrganizationId) -> Result<SigningKeyRecord> {
        self.keys.rotate_key(organization_id).await
    }

    pub async fn signing_keys(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<SigningKeyRecord>> {
        self.keys.get_all_keys(organization_id).await
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
