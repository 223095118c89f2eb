//! `auditseal verify`: re-derive every proof from a package archive alone.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use auditseal_crypto::{
    signing_message, Ed25519Signature, Ed25519Signer, HashProvider, Sha256Hash, Sha256Hasher,
    SigningProvider,
};
use auditseal_hardening::package::SIGNATURE_ALGORITHM;
use auditseal_hardening::{
    PackageContents, PackageError, AUDIT_PACK_REQUIRED_FILES, CHECK_AUDIT_PACK, CHECK_FILE_HASHES,
    CHECK_MERKLE_ROOT, CHECK_SIGNATURE, CHECK_TIMESTAMP,
};
use auditseal_manifest::{ArchiveReader, ExportType, ManifestBuilder};
use auditseal_timestamp::{parse_response, verify_basic};
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tracing::{debug, info};

use crate::output::{mark, FormattedOutput};

/// Verify a downloaded package archive offline.
#[derive(Debug, Args)]
pub struct VerifyCommand {
    /// Path to the package zip.
    #[arg(value_name = "PACKAGE")]
    pub package: PathBuf,
}

impl VerifyCommand {
    pub fn run(&self) -> anyhow::Result<OfflineReport> {
        let bytes = std::fs::read(&self.package)
            .with_context(|| format!("cannot read {}", self.package.display()))?;
        let mut report = auditseal_common_log::timed!("verify_archive", verify_archive(&bytes))
            .with_context(|| {
                format!("{} is not a readable audit package", self.package.display())
            })?;
        report.package = self.package.display().to_string();
        info!(package = %report.package, is_valid = report.is_valid, "package verified offline");
        Ok(report)
    }
}

/// One offline check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineCheck {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

impl OfflineCheck {
    fn new(name: &str, passed: bool, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed,
            details: details.into(),
        }
    }
}

/// Outcome of an offline verification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineReport {
    pub package: String,
    pub is_valid: bool,
    pub manifest_hash: Sha256Hash,
    pub merkle_root: Sha256Hash,
    pub checks: Vec<OfflineCheck>,
}

impl OfflineReport {
    pub fn check(&self, name: &str) -> Option<&OfflineCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

impl FormattedOutput for OfflineReport {
    fn format_text(&self) -> String {
        let mut lines = vec![
            format!("Package:       {}", self.package),
            format!("Manifest hash: {}", self.manifest_hash),
            format!("Merkle root:   {}", self.merkle_root),
            String::new(),
        ];
        for check in &self.checks {
            lines.push(format!("[{}] {}: {}", mark(check.passed), check.name, check.details));
        }
        lines.push(String::new());
        lines.push(if self.is_valid {
            "Result: VALID".to_string()
        } else {
            "Result: INVALID".to_string()
        });
        lines.join("\n")
    }
}

/// Verify a package archive held in memory.
///
/// Structural problems (missing entries, unreadable JSON) are errors; a
/// well-formed package whose proofs do not hold yields failed checks.
pub fn verify_archive(bytes: &[u8]) -> Result<OfflineReport, PackageError> {
    let contents = PackageContents::open(bytes)?;
    let hasher = Arc::new(Sha256Hasher);
    let manifest = &contents.manifest;
    let manifest_hash = hasher.hash_string(&manifest.to_canonical_json()?);
    let merkle_root = manifest.merkle_root();
    debug!(%manifest_hash, %merkle_root, files = manifest.file_count(), "package opened");

    let outcome = ManifestBuilder::new(hasher).verify_manifest(manifest, &contents.export)?;
    let mut checks = vec![
        if outcome.invalid_files.is_empty() {
            OfflineCheck::new(
                CHECK_FILE_HASHES,
                true,
                format!("{} files match their recorded hashes", manifest.file_count()),
            )
        } else {
            OfflineCheck::new(CHECK_FILE_HASHES, false, outcome.invalid_files.join(", "))
        },
        if outcome.merkle_root_match {
            OfflineCheck::new(CHECK_MERKLE_ROOT, true, format!("root {merkle_root} recomputed"))
        } else {
            OfflineCheck::new(
                CHECK_MERKLE_ROOT,
                false,
                "recomputed Merkle root differs from the manifest",
            )
        },
        check_signature(&contents, &manifest_hash, &merkle_root),
        check_timestamp(&contents, &manifest_hash),
    ];
    if manifest.export_type() == ExportType::AuditPack {
        checks.push(check_audit_pack(&contents.export)?);
    }

    Ok(OfflineReport {
        package: String::new(),
        is_valid: checks.iter().all(|c| c.passed),
        manifest_hash,
        merkle_root,
        checks,
    })
}

fn check_signature(
    contents: &PackageContents,
    manifest_hash: &Sha256Hash,
    merkle_root: &Sha256Hash,
) -> OfflineCheck {
    let document = &contents.signature;
    if document.algorithm != SIGNATURE_ALGORITHM {
        return OfflineCheck::new(
            CHECK_SIGNATURE,
            false,
            format!("unsupported algorithm {}", document.algorithm),
        );
    }
    let signature = match Ed25519Signature::new(&document.signature, &document.public_key) {
        Ok(signature) => signature,
        Err(err) => return OfflineCheck::new(CHECK_SIGNATURE, false, err.to_string()),
    };

    if Ed25519Signer.verify(&signing_message(manifest_hash, merkle_root), &signature) {
        OfflineCheck::new(
            CHECK_SIGNATURE,
            true,
            format!("valid signature made {}", document.signed_at.to_rfc3339()),
        )
    } else {
        OfflineCheck::new(
            CHECK_SIGNATURE,
            false,
            "signature does not verify with the embedded public key",
        )
    }
}

fn check_timestamp(contents: &PackageContents, manifest_hash: &Sha256Hash) -> OfflineCheck {
    let response = match parse_response(&contents.timestamp_token) {
        Ok(response) => response,
        Err(err) => {
            return OfflineCheck::new(CHECK_TIMESTAMP, false, format!("unreadable token: {err}"))
        }
    };
    if !response.status.is_granted() {
        return OfflineCheck::new(
            CHECK_TIMESTAMP,
            false,
            format!("authority did not grant the token (status {})", response.status.code()),
        );
    }

    let recorded = &contents.timestamp;
    let same_token = recorded
        .token_bytes()
        .map(|token| token == contents.timestamp_token)
        .unwrap_or(false);
    if !same_token || response.gen_time != recorded.timestamp {
        return OfflineCheck::new(
            CHECK_TIMESTAMP,
            false,
            "timestamp.json disagrees with timestamp.tsr",
        );
    }

    let result = verify_basic(recorded, manifest_hash, Utc::now());
    OfflineCheck::new(CHECK_TIMESTAMP, result.is_valid(), result.describe(recorded))
}

fn check_audit_pack(export: &[u8]) -> Result<OfflineCheck, PackageError> {
    let mut reader = ArchiveReader::open(export)?;
    let missing: Vec<&str> = AUDIT_PACK_REQUIRED_FILES
        .iter()
        .copied()
        .filter(|path| !reader.contains(path))
        .collect();
    Ok(if missing.is_empty() {
        OfflineCheck::new(
            CHECK_AUDIT_PACK,
            true,
            format!("all {} required files present", AUDIT_PACK_REQUIRED_FILES.len()),
        )
    } else {
        OfflineCheck::new(
            CHECK_AUDIT_PACK,
            false,
            format!("missing required files: {}", missing.join(", ")),
        )
    })
}
