//! Re-derivation of every proof of a stored package.
//!
//! Checks never abort the report: each one yields a named pass/fail with
//! details, and every attempt is written to `verification_logs`.

use auditseal_common_core::{AuditError, OrganizationId, PackageId, Result, VerificationLogId};
use auditseal_crypto::{HashProvider, Sha256Hash};
use auditseal_database::{
    NewVerificationLog, PackageFileRecord, PackageRecord, PackageRepository, PackageStatus,
    VerificationLogRepository, VerificationRequester,
};
use auditseal_keys::SigningService;
use auditseal_manifest::{ArchiveReader, AuditManifest, ExportType};
use auditseal_storage::{ObjectFetcher, WormStorageAdapter};
use auditseal_timestamp::{Rfc3161Timestamp, TimestampService};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::package::EXPORT_ENTRY;

pub const CHECK_OBJECT_LOCK: &str = "WORM Object Lock";
pub const CHECK_FILE_HASHES: &str = "File Hashes";
pub const CHECK_MERKLE_ROOT: &str = "Merkle Root";
pub const CHECK_SIGNATURE: &str = "Ed25519 Signature";
pub const CHECK_TIMESTAMP: &str = "RFC 3161 Timestamp";
pub const CHECK_AUDIT_PACK: &str = "Audit Pack Coverage";
/// Name of the single check reported when verification itself breaks down.
pub const CHECK_VERIFICATION: &str = "Verification";

/// Files an `audit_pack` export must contain.
pub const AUDIT_PACK_REQUIRED_FILES: [&str; 7] = [
    "evidence/entries.json",
    "evidence/corrections.json",
    "evidence/approvals.json",
    "evidence/audit-timeline.json",
    "meta/scope.json",
    "views/entries.csv",
    "views/approvals.csv",
];

/// One named check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCheck {
    pub name: String,
    pub passed: bool,
    pub details: String,
    /// Structured detail of a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl VerificationCheck {
    pub fn pass(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            details: details.into(),
            error: None,
        }
    }

    pub fn fail(name: &str, details: impl Into<String>, error: Value) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            details: details.into(),
            error: Some(error),
        }
    }
}

/// Outcome of [`VerificationService::verify_package`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub package_id: PackageId,
    pub organization_id: OrganizationId,
    pub is_valid: bool,
    pub checks: Vec<VerificationCheck>,
    pub verified_at: DateTime<Utc>,
    /// `None` when the attempt could not be written to `verification_logs`.
    pub log_id: Option<VerificationLogId>,
}

impl VerificationResult {
    pub fn check(&self, name: &str) -> Option<&VerificationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Verifies completed packages from persisted state.
pub struct VerificationService {
    packages: PackageRepository,
    logs: VerificationLogRepository,
    hasher: Arc<dyn HashProvider>,
    signing: SigningService,
    timestamps: TimestampService,
    storage: Arc<WormStorageAdapter>,
    fetcher: Arc<dyn ObjectFetcher>,
    presign_ttl: Duration,
}

impl VerificationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        packages: PackageRepository,
        logs: VerificationLogRepository,
        hasher: Arc<dyn HashProvider>,
        signing: SigningService,
        timestamps: TimestampService,
        storage: Arc<WormStorageAdapter>,
        fetcher: Arc<dyn ObjectFetcher>,
        presign_ttl: Duration,
    ) -> Self {
        Self {
            packages,
            logs,
            hasher,
            signing,
            timestamps,
            storage,
            fetcher,
            presign_ttl,
        }
    }

    /// Run every applicable check and log the attempt.
    ///
    /// Unknown packages and packages that are not `completed` fail fast
    /// (the attempt is still logged).
    #[instrument(skip(self, requester))]
    pub async fn verify_package(
        &self,
        package_id: PackageId,
        organization_id: OrganizationId,
        requester: VerificationRequester,
    ) -> Result<VerificationResult> {
        let package = match self.load(package_id, organization_id).await {
            Ok(package) => package,
            Err(err) => {
                let check = VerificationCheck::fail(
                    CHECK_VERIFICATION,
                    err.to_string(),
                    json!({ "message": err.to_string() }),
                );
                let verified_at = Utc::now();
                let log_id = match self
                    .record(package_id, organization_id, &[check.clone()], &requester, verified_at)
                    .await
                {
                    Ok(id) => Some(id),
                    Err(log_err) => {
                        warn!(%package_id, error = %log_err, "could not log rejected verification");
                        None
                    }
                };
                if matches!(err, AuditError::NotFound { .. } | AuditError::Validation { .. }) {
                    return Err(err);
                }
                warn!(%package_id, error = %err, "verification aborted");
                return Ok(VerificationResult {
                    package_id,
                    organization_id,
                    is_valid: false,
                    checks: vec![check],
                    verified_at,
                    log_id,
                });
            }
        };

        let checks = match self.packages.files(package_id).await {
            Ok(files) => self.run_checks(&package, &files).await,
            Err(err) => vec![VerificationCheck::fail(
                CHECK_VERIFICATION,
                format!("verification aborted: {err}"),
                json!({ "message": err.to_string() }),
            )],
        };

        let verified_at = Utc::now();
        let log_id = self
            .record(package_id, organization_id, &checks, &requester, verified_at)
            .await
            .map(Some)?;
        let is_valid = checks.iter().all(|c| c.passed);
        info!(
            %package_id,
            is_valid,
            failed = checks.iter().filter(|c| !c.passed).count(),
            "package verified"
        );

        Ok(VerificationResult {
            package_id,
            organization_id,
            is_valid,
            checks,
            verified_at,
            log_id,
        })
    }

    async fn load(
        &self,
        package_id: PackageId,
        organization_id: OrganizationId,
    ) -> Result<PackageRecord> {
        let package = self
            .packages
            .get_for_organization(package_id, organization_id)
            .await?
            .ok_or_else(|| AuditError::not_found("package", package_id))?;
        if package.status != PackageStatus::Completed {
            return Err(AuditError::validation(
                "package",
                format!("package {package_id} is {}, not completed", package.status),
            ));
        }
        Ok(package)
    }

    async fn run_checks(
        &self,
        package: &PackageRecord,
        files: &[PackageFileRecord],
    ) -> Vec<VerificationCheck> {
        let mut checks = vec![
            self.check_object_lock(package).await,
            check_file_hashes(files),
            self.check_merkle_root(package, files),
            self.check_signature(package).await,
            self.check_timestamp(package),
        ];
        if package.export_type == ExportType::AuditPack {
            checks.push(self.check_audit_pack(package).await);
        }
        checks
    }

    async fn record(
        &self,
        package_id: PackageId,
        organization_id: OrganizationId,
        checks: &[VerificationCheck],
        requester: &VerificationRequester,
        verified_at: DateTime<Utc>,
    ) -> Result<VerificationLogId> {
        let names = |passed: Option<bool>| -> Vec<String> {
            checks
                .iter()
                .filter(|c| passed.map_or(true, |p| c.passed == p))
                .map(|c| c.name.clone())
                .collect()
        };
        let error_details: Map<String, Value> = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| {
                let detail = c.error.clone().unwrap_or_else(|| json!({ "message": c.details }));
                (c.name.clone(), detail)
            })
            .collect();

        let log = NewVerificationLog {
            package_id,
            organization_id,
            is_valid: !checks.is_empty() && checks.iter().all(|c| c.passed),
            checks_performed: names(None),
            checks_passed: names(Some(true)),
            checks_failed: names(Some(false)),
            error_details: Value::Object(error_details),
            requester: requester.clone(),
            verified_at,
        };
        Ok(self.logs.insert(&log).await?)
    }

    async fn check_object_lock(&self, package: &PackageRecord) -> VerificationCheck {
        let (Some(bucket), Some(key)) = (&package.s3_bucket, &package.s3_key) else {
            return VerificationCheck::fail(
                CHECK_OBJECT_LOCK,
                "package has no storage key",
                json!({ "message": "missing s3 key" }),
            );
        };

        match self.storage.verify_object_lock_at(bucket, key).await {
            Ok(status) if status.locked => {
                let mode = status.mode.map(|m| m.as_s3_str()).unwrap_or("UNKNOWN");
                let until = status
                    .retain_until
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                VerificationCheck::pass(
                    CHECK_OBJECT_LOCK,
                    format!("{mode} retention until {until}"),
                )
            }
            Ok(_) => VerificationCheck::pass(
                CHECK_OBJECT_LOCK,
                "stored without storage-level immutability; \
                 integrity rests on hashes, signature and timestamp",
            ),
            Err(err) => VerificationCheck::pass(
                CHECK_OBJECT_LOCK,
                format!(
                    "retention could not be read ({err}); \
                     integrity rests on hashes, signature and timestamp"
                ),
            ),
        }
    }

    fn check_merkle_root(
        &self,
        package: &PackageRecord,
        files: &[PackageFileRecord],
    ) -> VerificationCheck {
        let Some(stored) = package.merkle_root.as_deref() else {
            return VerificationCheck::fail(
                CHECK_MERKLE_ROOT,
                "no Merkle root stored",
                json!({ "message": "missing merkle root" }),
            );
        };

        let mut ordered: Vec<&PackageFileRecord> = files.iter().collect();
        ordered.sort_by_key(|f| f.merkle_index);
        let leaves: std::result::Result<Vec<Sha256Hash>, _> =
            ordered.iter().map(|f| Sha256Hash::parse(&f.hash)).collect();
        let recomputed = leaves
            .map_err(|e| e.to_string())
            .and_then(|leaves| self.hasher.build_merkle_root(&leaves).map_err(|e| e.to_string()));

        match recomputed {
            Ok(root) if root.to_hex() == stored => VerificationCheck::pass(
                CHECK_MERKLE_ROOT,
                format!("root {root} over {} files", files.len()),
            ),
            Ok(root) => VerificationCheck::fail(
                CHECK_MERKLE_ROOT,
                "recomputed Merkle root differs from the stored root",
                json!({ "expected": stored, "actual": root.to_hex() }),
            ),
            Err(message) => VerificationCheck::fail(
                CHECK_MERKLE_ROOT,
                format!("Merkle root could not be recomputed: {message}"),
                json!({ "expected": stored, "message": message }),
            ),
        }
    }

    async fn check_signature(&self, package: &PackageRecord) -> VerificationCheck {
        let fail = |details: &str| {
            VerificationCheck::fail(CHECK_SIGNATURE, details, json!({ "message": details }))
        };
        let (Some(signature), Some(version), Some(manifest_hash), Some(merkle_root)) = (
            package.signature_value.as_deref(),
            package.signing_key_version,
            package.manifest_hash.as_deref(),
            package.merkle_root.as_deref(),
        ) else {
            return fail("signature material is incomplete");
        };
        let (Ok(manifest_hash), Ok(merkle_root)) =
            (Sha256Hash::parse(manifest_hash), Sha256Hash::parse(merkle_root))
        else {
            return fail("stored manifest hash or Merkle root is malformed");
        };

        // The stored manifest must still hash to what was signed.
        if let Some(json) = package.manifest_json.as_deref() {
            let rehashed = AuditManifest::from_pretty_json(json)
                .and_then(|m| m.to_canonical_json())
                .map(|canonical| self.hasher.hash_string(&canonical));
            match rehashed {
                Ok(hash) if hash == manifest_hash => {}
                Ok(hash) => {
                    return VerificationCheck::fail(
                        CHECK_SIGNATURE,
                        "stored manifest no longer matches the signed manifest hash",
                        json!({ "expected": manifest_hash.to_hex(), "actual": hash.to_hex() }),
                    )
                }
                Err(err) => return fail(&format!("stored manifest is unreadable: {err}")),
            }
        }

        match self
            .signing
            .verify_with_key_version(
                package.organization_id,
                version,
                &manifest_hash,
                &merkle_root,
                signature,
            )
            .await
        {
            Ok(true) => VerificationCheck::pass(
                CHECK_SIGNATURE,
                format!("valid signature by key version {version}"),
            ),
            Ok(false) => VerificationCheck::fail(
                CHECK_SIGNATURE,
                format!("signature does not verify with key version {version}"),
                json!({ "keyVersion": version }),
            ),
            Err(err) => fail(&format!("signing key unavailable: {err}")),
        }
    }

    fn check_timestamp(&self, package: &PackageRecord) -> VerificationCheck {
        let (Some(token), Some(at), Some(manifest_hash)) = (
            package.timestamp_token.as_deref(),
            package.timestamp_at,
            package.manifest_hash.as_deref(),
        ) else {
            return VerificationCheck::fail(
                CHECK_TIMESTAMP,
                "no timestamp stored",
                json!({ "message": "missing timestamp" }),
            );
        };
        let authority = package.timestamp_authority.clone().unwrap_or_default();
        let stamp = match Rfc3161Timestamp::new(token, at, authority) {
            Ok(stamp) => stamp,
            Err(err) => {
                return VerificationCheck::fail(
                    CHECK_TIMESTAMP,
                    err.to_string(),
                    json!({ "message": err.to_string() }),
                )
            }
        };
        let Ok(manifest_hash) = Sha256Hash::parse(manifest_hash) else {
            return VerificationCheck::fail(
                CHECK_TIMESTAMP,
                "stored manifest hash is malformed",
                json!({ "message": "malformed manifest hash" }),
            );
        };

        let result = self.timestamps.verify_timestamp(&stamp, &manifest_hash);
        let details = result.describe(&stamp);
        if result.is_valid() {
            VerificationCheck::pass(CHECK_TIMESTAMP, details)
        } else {
            VerificationCheck::fail(
                CHECK_TIMESTAMP,
                details,
                json!({
                    "hashPresent": result.hash_present,
                    "notInFuture": result.not_in_future,
                }),
            )
        }
    }

    async fn check_audit_pack(&self, package: &PackageRecord) -> VerificationCheck {
        let (Some(bucket), Some(key)) = (&package.s3_bucket, &package.s3_key) else {
            return VerificationCheck::fail(
                CHECK_AUDIT_PACK,
                "package has no storage key",
                json!({ "message": "missing s3 key" }),
            );
        };
        match self.missing_audit_pack_files(bucket, key).await {
            Ok(missing) if missing.is_empty() => VerificationCheck::pass(
                CHECK_AUDIT_PACK,
                format!("all {} required files present", AUDIT_PACK_REQUIRED_FILES.len()),
            ),
            Ok(missing) => VerificationCheck::fail(
                CHECK_AUDIT_PACK,
                format!("missing required files: {}", missing.join(", ")),
                json!({ "missing": missing }),
            ),
            Err(err) => VerificationCheck::fail(
                CHECK_AUDIT_PACK,
                format!("package could not be inspected: {err}"),
                json!({ "message": err.to_string() }),
            ),
        }
    }

    async fn missing_audit_pack_files(&self, bucket: &str, key: &str) -> Result<Vec<String>> {
        let url = self.storage.presign_download_at(bucket, key, self.presign_ttl).await?;
        let package = self.fetcher.fetch(&url).await?;
        let export = ArchiveReader::open(&package)?
            .read(EXPORT_ENTRY)?
            .ok_or_else(|| AuditError::not_found("package entry", EXPORT_ENTRY))?;

        let mut export = ArchiveReader::open(&export)?;
        Ok(AUDIT_PACK_REQUIRED_FILES
            .iter()
            .filter(|path| !export.contains(path))
            .map(|path| path.to_string())
            .collect())
    }
}

fn check_file_hashes(files: &[PackageFileRecord]) -> VerificationCheck {
    if files.is_empty() {
        return VerificationCheck::fail(
            CHECK_FILE_HASHES,
            "no file hashes stored",
            json!({ "message": "no files" }),
        );
    }
    let malformed: Vec<&str> = files
        .iter()
        .filter(|f| Sha256Hash::parse(&f.hash).is_err())
        .map(|f| f.path.as_str())
        .collect();
    if malformed.is_empty() {
        VerificationCheck::pass(
            CHECK_FILE_HASHES,
            format!("{} file hashes well-formed", files.len()),
        )
    } else {
        VerificationCheck::fail(
            CHECK_FILE_HASHES,
            format!("malformed hashes for: {}", malformed.join(", ")),
            json!({ "malformed": malformed }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, hash: &str, index: i64) -> PackageFileRecord {
        PackageFileRecord {
            path: path.into(),
            hash: hash.into(),
            size_bytes: 1,
            merkle_index: index,
        }
    }

    #[test]
    fn test_file_hashes_pass_when_well_formed() {
        let check = check_file_hashes(&[
            file("a", &"a".repeat(64), 0),
            file("b", &"0".repeat(64), 1),
        ]);
        assert!(check.passed);
        assert_eq!(check.name, CHECK_FILE_HASHES);
    }

    #[test]
    fn test_file_hashes_fail_when_empty() {
        assert!(!check_file_hashes(&[]).passed);
    }

    #[test]
    fn test_file_hashes_report_malformed_paths() {
        let check = check_file_hashes(&[file("ok", &"a".repeat(64), 0), file("bad", "ABC", 1)]);
        assert!(!check.passed);
        assert_eq!(check.error, Some(json!({ "malformed": ["bad"] })));
    }

    #[test]
    fn test_check_serializes_without_empty_error() {
        let json = serde_json::to_value(VerificationCheck::pass(CHECK_MERKLE_ROOT, "ok")).unwrap();
        assert_eq!(json, json!({ "name": "Merkle Root", "passed": true, "details": "ok" }));
    }
}
