mod common;

use auditseal_common_core::{AuditError, PackageId};
use auditseal_database::{PackageStatus, VerificationRequester};
use auditseal_hardening::{
    CHECK_AUDIT_PACK, CHECK_FILE_HASHES, CHECK_MERKLE_ROOT, CHECK_OBJECT_LOCK, CHECK_SIGNATURE,
    CHECK_TIMESTAMP, CHECK_VERIFICATION,
};
use auditseal_manifest::ExportType;
use auditseal_test_utils::archive::{audit_pack_export, audit_pack_export_without, sample_export};
use auditseal_test_utils::{assert_err, assert_ok};
use chrono::{Duration, Utc};
use common::{harness, Harness};
use serde_json::json;

async fn harden(h: &Harness, export_type: ExportType, archive: Vec<u8>) -> PackageId {
    h.system
        .harden_export(h.request(export_type, archive))
        .await
        .unwrap()
        .package_id
}

async fn execute(h: &Harness, sql: &str, package_id: PackageId) {
    sqlx::query(sql)
        .bind(package_id.to_string())
        .execute(h.system.database().pool().pool())
        .await
        .unwrap();
}

fn api_requester() -> VerificationRequester {
    VerificationRequester {
        actor_id: Some("auditor-7".into()),
        source: Some("api".into()),
        ip_address: Some("10.0.0.7".into()),
        user_agent: Some("curl/8.4".into()),
    }
}

#[tokio::test]
async fn test_checks_are_reported_in_order() {
    let h = harness().await;
    let package_id = harden(&h, ExportType::Payroll, sample_export()).await;

    let result = h
        .system
        .verify_package(package_id, h.org, api_requester())
        .await
        .unwrap();
    let names: Vec<_> = result.checks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            CHECK_OBJECT_LOCK,
            CHECK_FILE_HASHES,
            CHECK_MERKLE_ROOT,
            CHECK_SIGNATURE,
            CHECK_TIMESTAMP
        ]
    );
    assert!(result.check(CHECK_OBJECT_LOCK).unwrap().details.starts_with("GOVERNANCE"));

    let history = h.system.verification_history(package_id, h.org).await.unwrap();
    assert_eq!(history.len(), 1);
    let log = &history[0];
    assert_eq!(Some(log.id), result.log_id);
    assert!(log.is_valid);
    assert_eq!(log.checks_performed.len(), 5);
    assert!(log.checks_failed.is_empty());
    assert_eq!(log.error_details, json!({}));
    assert_eq!(log.requester, api_requester());
}

#[tokio::test]
async fn test_audit_pack_coverage_passes_with_every_required_file() {
    let h = harness().await;
    let package_id = harden(&h, ExportType::AuditPack, audit_pack_export()).await;

    let result = h
        .system
        .verify_package(package_id, h.org, VerificationRequester::default())
        .await
        .unwrap();
    assert!(result.is_valid, "{:#?}", result.checks);
    assert_eq!(result.checks.len(), 6);
    assert!(result.check(CHECK_AUDIT_PACK).unwrap().passed);
}

#[tokio::test]
async fn test_audit_pack_coverage_names_missing_files() {
    let h = harness().await;
    let archive = audit_pack_export_without(&["meta/scope.json", "views/approvals.csv"]);
    let package_id = harden(&h, ExportType::AuditPack, archive).await;

    let result = h
        .system
        .verify_package(package_id, h.org, VerificationRequester::default())
        .await
        .unwrap();
    assert!(!result.is_valid);
    let coverage = result.check(CHECK_AUDIT_PACK).unwrap();
    assert!(!coverage.passed);
    assert_eq!(
        coverage.error,
        Some(json!({ "missing": ["meta/scope.json", "views/approvals.csv"] }))
    );
    // Everything cryptographic still holds.
    assert!(result
        .checks
        .iter()
        .filter(|c| c.name != CHECK_AUDIT_PACK)
        .all(|c| c.passed));
}

#[tokio::test]
async fn test_tampered_file_hash_fails_merkle_root_and_is_logged() {
    let h = harness().await;
    let package_id = harden(&h, ExportType::Payroll, sample_export()).await;
    let forged = "0".repeat(64);
    execute(
        &h,
        &format!(
            "UPDATE audit_export_files SET hash = '{forged}'
             WHERE package_id = ? AND merkle_index = 0"
        ),
        package_id,
    )
    .await;

    let result = h
        .system
        .verify_package(package_id, h.org, VerificationRequester::default())
        .await
        .unwrap();
    assert!(!result.is_valid);
    assert!(result.check(CHECK_FILE_HASHES).unwrap().passed);
    let merkle = result.check(CHECK_MERKLE_ROOT).unwrap();
    assert!(!merkle.passed);
    assert!(merkle.error.as_ref().unwrap().get("expected").is_some());
    assert!(result.check(CHECK_SIGNATURE).unwrap().passed);

    let log = &h.system.verification_history(package_id, h.org).await.unwrap()[0];
    assert!(!log.is_valid);
    assert_eq!(log.checks_failed, vec![CHECK_MERKLE_ROOT.to_string()]);
    assert!(log.error_details.get(CHECK_MERKLE_ROOT).is_some());
}

#[tokio::test]
async fn test_malformed_file_hash_fails_file_hashes() {
    let h = harness().await;
    let package_id = harden(&h, ExportType::Payroll, sample_export()).await;
    execute(
        &h,
        "UPDATE audit_export_files SET hash = 'not-a-hash'
         WHERE package_id = ? AND path = 'README.md'",
        package_id,
    )
    .await;

    let result = h
        .system
        .verify_package(package_id, h.org, VerificationRequester::default())
        .await
        .unwrap();
    let hashes = result.check(CHECK_FILE_HASHES).unwrap();
    assert!(!hashes.passed);
    assert_eq!(hashes.error, Some(json!({ "malformed": ["README.md"] })));
    assert!(!result.check(CHECK_MERKLE_ROOT).unwrap().passed);
}

#[tokio::test]
async fn test_forged_signature_fails() {
    let h = harness().await;
    let package_id = harden(&h, ExportType::Payroll, sample_export()).await;
    let zero_signature = format!("{}==", "A".repeat(86));
    execute(
        &h,
        &format!(
            "UPDATE audit_export_packages SET signature_value = '{zero_signature}' WHERE id = ?"
        ),
        package_id,
    )
    .await;

    let result = h
        .system
        .verify_package(package_id, h.org, VerificationRequester::default())
        .await
        .unwrap();
    assert!(!result.is_valid);
    assert!(!result.check(CHECK_SIGNATURE).unwrap().passed);
    assert!(result.check(CHECK_MERKLE_ROOT).unwrap().passed);
}

#[tokio::test]
async fn test_edited_manifest_fails_signature() {
    let h = harness().await;
    let package_id = harden(&h, ExportType::Payroll, sample_export()).await;
    execute(
        &h,
        "UPDATE audit_export_packages
         SET manifest_json = replace(manifest_json, 'README.md', 'README.txt')
         WHERE id = ?",
        package_id,
    )
    .await;

    let result = h
        .system
        .verify_package(package_id, h.org, VerificationRequester::default())
        .await
        .unwrap();
    let signature = result.check(CHECK_SIGNATURE).unwrap();
    assert!(!signature.passed);
    assert!(signature.details.contains("no longer matches"));
}

#[tokio::test]
async fn test_future_timestamp_fails() {
    let h = harness().await;
    let package_id = harden(&h, ExportType::Payroll, sample_export()).await;
    sqlx::query("UPDATE audit_export_packages SET timestamp_at = ? WHERE id = ?")
        .bind(Utc::now() + Duration::days(2))
        .bind(package_id.to_string())
        .execute(h.system.database().pool().pool())
        .await
        .unwrap();

    let result = h
        .system
        .verify_package(package_id, h.org, VerificationRequester::default())
        .await
        .unwrap();
    let timestamp = result.check(CHECK_TIMESTAMP).unwrap();
    assert!(!timestamp.passed);
    assert_eq!(timestamp.error.as_ref().unwrap()["notInFuture"], json!(false));
}

#[tokio::test]
async fn test_rotation_keeps_old_packages_verifiable() {
    let h = harness().await;
    let before = harden(&h, ExportType::Payroll, sample_export()).await;
    h.system.rotate_key(h.org).await.unwrap();
    let after = harden(&h, ExportType::Payroll, sample_export()).await;

    let old = h
        .system
        .verify_package(before, h.org, VerificationRequester::default())
        .await
        .unwrap();
    assert!(old.is_valid, "{:#?}", old.checks);
    assert!(old.check(CHECK_SIGNATURE).unwrap().details.contains("key version 1"));

    let new = h
        .system
        .verify_package(after, h.org, VerificationRequester::default())
        .await
        .unwrap();
    assert!(new.is_valid);
    assert!(new.check(CHECK_SIGNATURE).unwrap().details.contains("key version 2"));

    let keys = h.system.signing_keys(h.org).await.unwrap();
    assert_eq!(keys.len(), 2);
}

#[tokio::test]
async fn test_failed_package_is_refused_but_logged() {
    let h = harness().await;
    h.tsa.set_unavailable(true);
    h.system
        .harden_export(h.request(ExportType::Payroll, sample_export()))
        .await
        .unwrap_err();
    let failed = h.system.list_packages(h.org).await.unwrap().remove(0);
    assert_eq!(failed.status, PackageStatus::Failed);

    let err = assert_err!(
        h.system
            .verify_package(failed.id, h.org, VerificationRequester::default())
            .await
    );
    assert!(matches!(err, AuditError::Validation { .. }));

    let history = h.system.verification_history(failed.id, h.org).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_valid);
    assert_eq!(history[0].checks_failed, vec![CHECK_VERIFICATION.to_string()]);
}

#[tokio::test]
async fn test_unreachable_database_yields_single_failed_check() {
    let h = harness().await;
    let package_id = harden(&h, ExportType::Payroll, sample_export()).await;
    h.system.close().await;

    let result = assert_ok!(h.system.verify_package(package_id, h.org, api_requester()).await);
    assert!(!result.is_valid);
    assert_eq!(result.checks.len(), 1);
    let check = result.check(CHECK_VERIFICATION).unwrap();
    assert!(!check.passed);
    assert!(check.details.contains("closed"));
    assert_eq!(result.log_id, None);
}

#[tokio::test]
async fn test_unknown_package_is_not_found() {
    let h = harness().await;
    let err = assert_err!(
        h.system
            .verify_package(PackageId::new(), h.org, VerificationRequester::default())
            .await
    );
    assert!(matches!(err, AuditError::NotFound { .. }));
}

#[tokio::test]
async fn test_package_of_another_organization_is_not_found() {
    let h = harness().await;
    let package_id = harden(&h, ExportType::Payroll, sample_export()).await;
    let other = auditseal_common_core::OrganizationId::new();

    let err = assert_err!(
        h.system
            .verify_package(package_id, other, VerificationRequester::default())
            .await
    );
    assert!(matches!(err, AuditError::NotFound { .. }));
    assert!(h.system.verification_history(package_id, h.org).await.unwrap().is_empty());
}
