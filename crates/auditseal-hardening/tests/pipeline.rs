mod common;

use auditseal_common_config::AuditSealConfig;
use auditseal_common_core::{AuditError, LockMode, RetentionYears};
use auditseal_crypto::{build_merkle_root, hash_bytes, HashProvider, Sha256Hasher};
use auditseal_database::{PackageStatus, VerificationRequester};
use auditseal_hardening::package::{EXPORT_ENTRY, README_ENTRY, TIMESTAMP_TOKEN_ENTRY};
use auditseal_hardening::{AuditSystem, Collaborators, PackageContents};
use auditseal_manifest::{ExportType, ManifestBuilder};
use auditseal_storage::{MemoryObjectFetcher, MemoryObjectStorage, ObjectStorage};
use auditseal_test_utils::archive::{entry_names, read_entry, sample_export, zip_bytes};
use auditseal_test_utils::{assert_err, within};
use chrono::{Datelike, Utc};
use common::{harness, harness_over, harness_with_lock, PresignOutage, SyntheticTsa, BUCKET};
use std::sync::Arc;
use std::time::Duration;
use test_case::test_case;

#[tokio::test]
async fn test_three_file_export_end_to_end() {
    let h = harness().await;
    let export = sample_export();
    let request = h.request(ExportType::Payroll, export.clone());
    let export_id = request.export_id;

    let hardened = h.system.harden_export(request).await.unwrap();

    // Leaves in path order: README.md, employees.json, payroll/2024-03.csv.
    let leaves = ["README.md", "employees.json", "payroll/2024-03.csv"]
        .iter()
        .map(|path| hash_bytes(&read_entry(&export, path).unwrap()))
        .collect::<Vec<_>>();
    assert_eq!(hardened.merkle_root, build_merkle_root(&leaves).unwrap());

    let package = h.system.get_package(hardened.package_id, h.org).await.unwrap();
    assert_eq!(package.status, PackageStatus::Completed);
    assert_eq!(package.export_id, export_id);
    assert_eq!(package.merkle_root.as_deref(), Some(hardened.merkle_root.to_hex().as_str()));
    assert_eq!(package.file_count, Some(3));
    assert_eq!(package.signing_key_version, Some(1));
    assert!(package.object_lock_enabled);
    assert_eq!(package.lock_mode, Some(LockMode::Governance));
    assert!(package.completed_at.is_some());

    let files = h.system.package_files(hardened.package_id, h.org).await.unwrap();
    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["README.md", "employees.json", "payroll/2024-03.csv"]);

    let expected_key = format!(
        "audit-exports/{}/{}/{}.zip",
        h.org,
        Utc::now().format("%Y-%m-%d"),
        hardened.package_id
    );
    assert_eq!(hardened.s3_key, expected_key);
    assert!(hardened.download_url.starts_with("memory://audit-worm/"));

    let result = h
        .system
        .verify_package(hardened.package_id, h.org, VerificationRequester::default())
        .await
        .unwrap();
    assert!(result.is_valid, "{:#?}", result.checks);
    assert_eq!(result.checks.len(), 5);
    assert!(result.checks.iter().all(|c| c.passed));
}

#[tokio::test]
async fn test_stored_archive_verifies_offline() {
    let h = harness().await;
    let export = sample_export();
    let hardened = h
        .system
        .harden_export(h.request(ExportType::Data, export.clone()))
        .await
        .unwrap();

    let stored = h.storage.get_object(BUCKET, &hardened.s3_key).await.unwrap();
    let names = entry_names(&stored);
    assert!(names.contains(&EXPORT_ENTRY.to_string()));
    assert!(names.contains(&README_ENTRY.to_string()));

    let contents = PackageContents::open(&stored).unwrap();
    assert_eq!(contents.export, export);
    assert_eq!(contents.manifest.merkle_root(), hardened.merkle_root);
    assert_eq!(
        Sha256Hasher.hash_string(&contents.manifest.to_canonical_json().unwrap()),
        hardened.manifest_hash
    );
    assert_eq!(contents.timestamp.timestamp, hardened.timestamp);
    assert_eq!(
        read_entry(&stored, TIMESTAMP_TOKEN_ENTRY).unwrap(),
        contents.timestamp.token_bytes().unwrap()
    );

    let check = ManifestBuilder::new(Arc::new(Sha256Hasher))
        .verify_manifest(&contents.manifest, &contents.export)
        .unwrap();
    assert!(check.is_valid);
}

#[tokio::test]
async fn test_upload_without_object_lock_still_completes() {
    let h = harness_with_lock(false).await;
    let hardened = h
        .system
        .harden_export(h.request(ExportType::Payroll, sample_export()))
        .await
        .unwrap();
    assert!(!hardened.object_lock_enabled);
    assert_eq!(hardened.lock_mode, None);

    let result = h
        .system
        .verify_package(hardened.package_id, h.org, VerificationRequester::default())
        .await
        .unwrap();
    assert!(result.is_valid);
    let lock = result.check(auditseal_hardening::CHECK_OBJECT_LOCK).unwrap();
    assert!(lock.passed);
    assert!(lock.details.contains("without storage-level immutability"));
}

#[tokio::test]
async fn test_tsa_outage_marks_attempt_failed_and_retry_creates_new_attempt() {
    let h = harness().await;
    h.tsa.set_unavailable(true);
    let request = h.request(ExportType::Payroll, sample_export());

    let err = assert_err!(h.system.harden_export(request.clone()).await);
    assert!(matches!(err, AuditError::ExternalService { .. }));
    assert_eq!(h.tsa.requests(), 3);
    assert_eq!(h.storage.object_count(BUCKET), 0);

    let failed = h.system.list_packages(h.org).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, PackageStatus::Failed);
    assert!(failed[0].error_message.as_deref().unwrap().contains("connection refused"));

    h.tsa.set_unavailable(false);
    let hardened = h.system.harden_export(request.clone()).await.unwrap();
    assert_ne!(hardened.package_id, failed[0].id);

    let attempts = h
        .system
        .database()
        .packages()
        .list_for_export(h.org, request.export_id)
        .await
        .unwrap();
    assert_eq!(attempts.len(), 2);
    assert!(attempts.iter().any(|p| p.id == failed[0].id && p.status == PackageStatus::Failed));
    assert!(attempts
        .iter()
        .any(|p| p.id == hardened.package_id && p.status == PackageStatus::Completed));
}

#[tokio::test]
async fn test_presign_failure_leaves_package_failed() {
    let storage = Arc::new(MemoryObjectStorage::new().with_bucket(BUCKET, true));
    let h = harness_over(storage.clone(), Arc::new(PresignOutage(storage.clone()))).await;

    let err = assert_err!(
        h.system
            .harden_export(h.request(ExportType::Payroll, sample_export()))
            .await
    );
    assert!(err.to_string().contains("presigner down"));

    let packages = h.system.list_packages(h.org).await.unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].status, PackageStatus::Failed);
    assert!(packages[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("presigner down"));
}

#[tokio::test]
async fn test_empty_archive_is_rejected() {
    let h = harness().await;
    let err = assert_err!(
        h.system
            .harden_export(h.request(ExportType::Data, zip_bytes(&[("empty/", &b""[..])])))
            .await
    );
    assert!(matches!(err, AuditError::Validation { .. }));

    let packages = h.system.list_packages(h.org).await.unwrap();
    assert_eq!(packages[0].status, PackageStatus::Failed);
    assert_eq!(h.tsa.requests(), 0);
}

#[tokio::test]
async fn test_concurrent_hardening_of_same_export_is_refused() {
    let h = harness().await;
    let request = h.request(ExportType::Payroll, sample_export());

    let (first, second) = within(Duration::from_secs(30), async {
        tokio::join!(
            h.system.harden_export(request.clone()),
            h.system.harden_export(request.clone())
        )
    })
    .await;
    let outcomes = [first, second];
    let refused: Vec<_> = outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .collect();
    assert_eq!(refused.len(), 1);
    assert!(matches!(
        refused[0],
        AuditError::Validation { field, .. } if field == "export_id"
    ));
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);

    // Once the first run is over the export can be hardened again.
    assert!(h.system.harden_export(request).await.is_ok());
}

#[test_case(0 ; "zero years")]
#[test_case(11 ; "eleven years")]
#[tokio::test]
async fn test_retention_outside_bounds_rejected(years: u32) {
    let h = harness().await;
    let err = assert_err!(
        h.system
            .update_audit_config(h.org, years, LockMode::Governance, None)
            .await
    );
    assert!(matches!(err, AuditError::Validation { .. }));
    assert!(RetentionYears::new(years).is_err());
}

#[test_case(1 ; "one year")]
#[test_case(10 ; "ten years")]
#[tokio::test]
async fn test_retention_within_bounds_applied(years: u32) {
    let h = harness().await;
    let config = h
        .system
        .update_audit_config(h.org, years, LockMode::Compliance, None)
        .await
        .unwrap();
    assert_eq!(config.retention_years.get(), years);

    let hardened = h
        .system
        .harden_export(h.request(ExportType::Payroll, sample_export()))
        .await
        .unwrap();
    assert_eq!(hardened.lock_mode, Some(LockMode::Compliance));
    let expected_year = Utc::now().year() + years as i32;
    assert!((hardened.retention_until.year() - expected_year).abs() <= 1);

    let package = h.system.get_package(hardened.package_id, h.org).await.unwrap();
    assert_eq!(package.retention_years.get(), years);
}

#[tokio::test]
async fn test_bucket_override_from_audit_config() {
    let storage = Arc::new(
        MemoryObjectStorage::new()
            .with_bucket(BUCKET, true)
            .with_bucket("eu-audit", true),
    );
    let mut config = AuditSealConfig::default();
    config.storage.bucket = BUCKET.to_string();
    let system = AuditSystem::new(
        &config,
        auditseal_database::Database::in_memory().await.unwrap(),
        Collaborators {
            object_storage: storage.clone(),
            fetcher: Arc::new(MemoryObjectFetcher::new(storage.clone())),
            secrets: Arc::new(auditseal_common_secret::MemorySecretStore::new()),
            tsa: Arc::new(SyntheticTsa::default()),
        },
    )
    .unwrap();
    let org = auditseal_common_core::OrganizationId::new();
    system
        .update_audit_config(org, 7, LockMode::Governance, Some("eu-audit"))
        .await
        .unwrap();

    let hardened = system
        .harden_export(auditseal_hardening::HardenRequest {
            organization_id: org,
            export_id: auditseal_common_core::ExportId::new(),
            export_type: ExportType::Data,
            archive: sample_export(),
        })
        .await
        .unwrap();
    assert_eq!(hardened.bucket, "eu-audit");
    assert_eq!(storage.object_count("eu-audit"), 1);
    assert_eq!(storage.object_count(BUCKET), 0);
}

#[tokio::test]
async fn test_connect_with_on_disk_database() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryObjectStorage::new().with_bucket(BUCKET, true));
    let mut config = AuditSealConfig::default();
    config.storage.bucket = BUCKET.to_string();
    config.database.path = dir.path().join("auditseal.db");

    let collaborators = || Collaborators {
        object_storage: storage.clone(),
        fetcher: Arc::new(MemoryObjectFetcher::new(storage.clone())),
        secrets: Arc::new(auditseal_common_secret::MemorySecretStore::new()),
        tsa: Arc::new(SyntheticTsa::default()),
    };
    let org = auditseal_common_core::OrganizationId::new();

    let system = AuditSystem::connect(&config, collaborators()).await.unwrap();
    system.update_audit_config(org, 3, LockMode::Governance, None).await.unwrap();
    system.close().await;

    let reopened = AuditSystem::connect(&config, collaborators()).await.unwrap();
    assert_eq!(reopened.audit_config(org).await.unwrap().retention_years.get(), 3);
}
