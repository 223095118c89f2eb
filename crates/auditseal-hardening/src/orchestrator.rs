//! The hardening pipeline.
//!
//! `pending → building_manifest → signing → timestamping → uploading →
//! completed`, one step after another. Any failure marks the attempt
//! `failed` and is returned to the caller; a retry is a new attempt.

use auditseal_common_core::{
    AuditError, ExportId, LockMode, OrganizationId, PackageId, Result, RetentionYears,
};
use auditseal_common_log::spans::{external_span, record_error};
use auditseal_common_log::timed;
use auditseal_crypto::Sha256Hash;
use auditseal_database::{
    AuditConfigRecord, AuditConfigRepository, CompletedPackage, NewPackage, PackageFileRecord,
    PackageRepository, PackageStatus,
};
use auditseal_keys::SigningService;
use auditseal_manifest::{ExportType, ManifestBuilder};
use auditseal_storage::{package_key, UploadOutcome, WormStorageAdapter};
use auditseal_timestamp::TimestampService;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::package::{assemble_package, SignedAuditPackage};

/// Input of [`HardeningOrchestrator::harden_export`].
#[derive(Clone)]
pub struct HardenRequest {
    pub organization_id: OrganizationId,
    pub export_id: ExportId,
    pub export_type: ExportType,
    /// Raw bytes of the export zip.
    pub archive: Vec<u8>,
}

impl std::fmt::Debug for HardenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardenRequest")
            .field("organization_id", &self.organization_id)
            .field("export_id", &self.export_id)
            .field("export_type", &self.export_type)
            .field("archive_bytes", &self.archive.len())
            .finish()
    }
}

/// A completed hardening attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardenedExport {
    pub package_id: PackageId,
    /// Presigned download URL.
    pub download_url: String,
    pub bucket: String,
    pub s3_key: String,
    pub manifest_hash: Sha256Hash,
    pub merkle_root: Sha256Hash,
    pub signing_key_version: i64,
    pub timestamp: DateTime<Utc>,
    pub object_lock_enabled: bool,
    pub lock_mode: Option<LockMode>,
    pub retention_until: DateTime<Utc>,
}

/// Static settings of the pipeline.
#[derive(Debug, Clone)]
pub struct HardeningSettings {
    pub key_prefix: String,
    pub presign_ttl: Duration,
    pub default_retention: RetentionYears,
    pub default_lock_mode: LockMode,
}

impl Default for HardeningSettings {
    fn default() -> Self {
        Self {
            key_prefix: "audit-exports".to_string(),
            presign_ttl: Duration::from_secs(24 * 60 * 60),
            default_retention: RetentionYears::DEFAULT,
            default_lock_mode: LockMode::Governance,
        }
    }
}

type InFlightKey = (OrganizationId, ExportId);

/// Removes its key from the in-flight set when the run ends.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<InFlightKey>>,
    key: InFlightKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

/// Turns an export archive into a signed, timestamped, stored package.
pub struct HardeningOrchestrator {
    configs: AuditConfigRepository,
    packages: PackageRepository,
    manifests: ManifestBuilder,
    signing: SigningService,
    timestamps: TimestampService,
    storage: Arc<WormStorageAdapter>,
    settings: HardeningSettings,
    in_flight: Mutex<HashSet<InFlightKey>>,
}

impl HardeningOrchestrator {
    pub fn new(
        configs: AuditConfigRepository,
        packages: PackageRepository,
        manifests: ManifestBuilder,
        signing: SigningService,
        timestamps: TimestampService,
        storage: Arc<WormStorageAdapter>,
        settings: HardeningSettings,
    ) -> Self {
        Self {
            configs,
            packages,
            manifests,
            signing,
            timestamps,
            storage,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(
        &self,
        organization_id: OrganizationId,
        export_id: ExportId,
    ) -> Result<InFlightGuard<'_>> {
        let key = (organization_id, export_id);
        if !self.in_flight.lock().insert(key) {
            return Err(AuditError::validation(
                "export_id",
                format!("export {export_id} is already being hardened"),
            ));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            key,
        })
    }

    /// Harden one export. Every call is a new package attempt.
    #[instrument(
        skip(self, request),
        fields(
            organization_id = %request.organization_id,
            export_id = %request.export_id,
            export_type = %request.export_type,
            package_id = tracing::field::Empty,
            error = tracing::field::Empty,
        )
    )]
    pub async fn harden_export(&self, request: HardenRequest) -> Result<HardenedExport> {
        let _guard = self.claim(request.organization_id, request.export_id)?;

        let config = self
            .configs
            .get_or_create(
                request.organization_id,
                self.settings.default_retention,
                self.settings.default_lock_mode,
            )
            .await?;

        let package_id = PackageId::new();
        tracing::Span::current().record("package_id", tracing::field::display(package_id));
        self.packages
            .insert_pending(&NewPackage {
                id: package_id,
                organization_id: request.organization_id,
                export_id: request.export_id,
                export_type: request.export_type,
                retention_years: config.retention_years,
            })
            .await?;
        info!(%package_id, retention_years = config.retention_years.get(), "hardening started");

        match self.run(package_id, &request, &config).await {
            Ok(hardened) => Ok(hardened),
            Err(err) => {
                record_error(&err);
                error!(%package_id, error = %err, "hardening failed");
                let marked = self.packages.mark_failed(package_id, &err.to_string()).await;
                if let Err(mark_err) = marked {
                    warn!(%package_id, error = %mark_err, "could not record failure");
                }
                Err(err)
            }
        }
    }

    async fn advance(&self, package_id: PackageId, status: PackageStatus) -> Result<()> {
        self.packages.update_status(package_id, status).await?;
        debug!(%package_id, %status, "step started");
        Ok(())
    }

    async fn run(
        &self,
        package_id: PackageId,
        request: &HardenRequest,
        config: &AuditConfigRecord,
    ) -> Result<HardenedExport> {
        let organization_id = request.organization_id;

        self.advance(package_id, PackageStatus::BuildingManifest).await?;
        let built = timed!(
            "build_manifest",
            self.manifests.build_manifest(
                request.export_id,
                organization_id,
                request.export_type,
                &request.archive,
            )
        )?;
        let merkle_root = built.manifest.merkle_root();

        self.advance(package_id, PackageStatus::Signing).await?;
        let signature = self
            .signing
            .sign_manifest(organization_id, &built.manifest_hash, &merkle_root)
            .await?;

        self.advance(package_id, PackageStatus::Timestamping).await?;
        let timestamp = self
            .timestamps
            .timestamp_manifest(&built.manifest_hash)
            .instrument(external_span("tsa", "timestamp"))
            .await?;

        let mut signed = SignedAuditPackage {
            manifest: built.manifest,
            manifest_hash: built.manifest_hash,
            signature,
            timestamp,
            retention_years: config.retention_years,
            s3_key: None,
        };
        let archive = assemble_package(&request.archive, &signed)?;

        self.advance(package_id, PackageStatus::Uploading).await?;
        let key = package_key(
            &self.settings.key_prefix,
            organization_id,
            Utc::now().date_naive(),
            package_id,
        );
        let upload = self
            .storage
            .upload_with_retention(organization_id, &key, archive, config.retention_years)
            .instrument(external_span("object_storage", "upload"))
            .await?;
        signed.s3_key = Some(upload.key.clone());

        let download_url = self
            .storage
            .presign_download_at(&upload.bucket, &upload.key, self.settings.presign_ttl)
            .await?;
        self.packages
            .complete(package_id, &completed_record(&signed, &upload)?)
            .await?;

        info!(
            %package_id,
            files = signed.manifest.file_count(),
            %merkle_root,
            key = %upload.key,
            object_lock = upload.object_lock_enabled,
            "hardening completed"
        );
        Ok(HardenedExport {
            package_id,
            download_url,
            bucket: upload.bucket,
            s3_key: upload.key,
            manifest_hash: signed.manifest_hash,
            merkle_root,
            signing_key_version: signed.signature.key_version,
            timestamp: signed.timestamp.timestamp,
            object_lock_enabled: upload.object_lock_enabled,
            lock_mode: upload.lock_mode,
            retention_until: upload.retention_until,
        })
    }
}

fn to_i64(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| AuditError::validation(field, format!("{value} does not fit")))
}

fn completed_record(
    signed: &SignedAuditPackage,
    upload: &UploadOutcome,
) -> Result<CompletedPackage> {
    let manifest = &signed.manifest;
    let files = manifest
        .files()
        .iter()
        .map(|file| {
            Ok(PackageFileRecord {
                path: file.path.clone(),
                hash: file.hash.to_hex(),
                size_bytes: to_i64(file.size_bytes, "size_bytes")?,
                merkle_index: i64::from(file.merkle_index),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CompletedPackage {
        manifest_json: manifest.to_pretty_json()?,
        manifest_hash: signed.manifest_hash.to_hex(),
        merkle_root: manifest.merkle_root().to_hex(),
        file_count: to_i64(manifest.file_count() as u64, "file_count")?,
        total_size_bytes: to_i64(manifest.total_size_bytes(), "total_size_bytes")?,
        signature_value: signed.signature.signature.signature.clone(),
        signature_public_key: signed.signature.signature.public_key.clone(),
        signing_key_id: signed.signature.key_id,
        signing_key_version: signed.signature.key_version,
        signed_at: signed.signature.signed_at,
        timestamp_token: signed.timestamp.token.clone(),
        timestamp_at: signed.timestamp.timestamp,
        timestamp_authority: signed.timestamp.authority.clone(),
        s3_bucket: upload.bucket.clone(),
        s3_key: upload.key.clone(),
        retention_until: upload.retention_until,
        object_lock_enabled: upload.object_lock_enabled,
        lock_mode: upload.lock_mode,
        files,
    })
}
