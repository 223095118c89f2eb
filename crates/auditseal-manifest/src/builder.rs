//! Manifest construction and re-verification against archive bytes.

use auditseal_common_core::{ExportId, OrganizationId};
use auditseal_crypto::{HashProvider, Sha256Hash};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::archive::ArchiveReader;
use crate::error::ManifestError;
use crate::types::{AuditFileEntry, AuditManifest, ExportType};

/// A manifest together with the hash of its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltManifest {
    pub manifest: AuditManifest,
    pub manifest_hash: Sha256Hash,
}

/// Outcome of [`ManifestBuilder::verify_manifest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestVerification {
    pub is_valid: bool,
    /// `"<path> (missing in ZIP)"` or `"<path> (hash mismatch)"`.
    pub invalid_files: Vec<String>,
    pub merkle_root_match: bool,
}

/// Builds manifests from export archives.
#[derive(Clone)]
pub struct ManifestBuilder {
    hasher: Arc<dyn HashProvider>,
}

impl ManifestBuilder {
    pub fn new(hasher: Arc<dyn HashProvider>) -> Self {
        Self { hasher }
    }

    /// Hash every file of `archive` in path order and aggregate them.
    #[instrument(skip(self, archive), fields(archive_bytes = archive.len()))]
    pub fn build_manifest(
        &self,
        export_id: ExportId,
        organization_id: OrganizationId,
        export_type: ExportType,
        archive: &[u8],
    ) -> Result<BuiltManifest, ManifestError> {
        let files = ArchiveReader::open(archive)?.files()?;
        if files.is_empty() {
            return Err(ManifestError::EmptyArchive);
        }

        let entries: Vec<AuditFileEntry> = files
            .iter()
            .enumerate()
            .map(|(index, file)| AuditFileEntry {
                path: file.path.clone(),
                hash: self.hasher.hash_buffer(&file.content),
                size_bytes: file.size_bytes(),
                merkle_index: index as u32,
            })
            .collect();
        let leaves: Vec<Sha256Hash> = entries.iter().map(|e| e.hash).collect();
        let merkle_root = self.hasher.build_merkle_root(&leaves)?;

        let manifest = AuditManifest::new(
            export_id,
            organization_id,
            export_type,
            Utc::now(),
            entries,
            merkle_root,
        )?;
        let manifest_hash = self.manifest_hash(&manifest)?;
        debug!(files = manifest.file_count(), %merkle_root, %manifest_hash, "manifest built");

        Ok(BuiltManifest {
            manifest,
            manifest_hash,
        })
    }

    /// Hash of the canonical form.
    pub fn manifest_hash(&self, manifest: &AuditManifest) -> Result<Sha256Hash, ManifestError> {
        Ok(self.hasher.hash_string(&manifest.to_canonical_json()?))
    }

    /// Re-hash `archive` against `manifest`.
    ///
    /// The root is recomputed from the recomputed hashes in Merkle order; a
    /// missing file leaves no leaf to recompute, so the root cannot match.
    pub fn verify_manifest(
        &self,
        manifest: &AuditManifest,
        archive: &[u8],
    ) -> Result<ManifestVerification, ManifestError> {
        let mut reader = ArchiveReader::open(archive)?;
        let mut invalid_files = Vec::new();
        let mut recomputed = Vec::with_capacity(manifest.file_count());
        let mut complete = true;

        for entry in manifest.files_in_merkle_order() {
            match reader.read(&entry.path)? {
                None => {
                    invalid_files.push(format!("{} (missing in ZIP)", entry.path));
                    complete = false;
                }
                Some(content) => {
                    let hash = self.hasher.hash_buffer(&content);
                    if hash != entry.hash {
                        invalid_files.push(format!("{} (hash mismatch)", entry.path));
                    }
                    recomputed.push(hash);
                }
            }
        }

        let merkle_root_match = complete
            && !recomputed.is_empty()
            && self.hasher.build_merkle_root(&recomputed)? == manifest.merkle_root();
        if !invalid_files.is_empty() || !merkle_root_match {
            warn!(invalid = invalid_files.len(), merkle_root_match, "manifest verification failed");
        }

        Ok(ManifestVerification {
            is_valid: invalid_files.is_empty() && merkle_root_match,
            invalid_files,
            merkle_root_match,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditseal_crypto::{build_merkle_root, hash_bytes, Sha256Hasher};
    use auditseal_test_utils::archive::{sample_export, tamper_entry, zip_bytes};

    fn builder() -> ManifestBuilder {
        ManifestBuilder::new(Arc::new(Sha256Hasher))
    }

    fn build(archive: &[u8]) -> BuiltManifest {
        builder()
            .build_manifest(ExportId::new(), OrganizationId::new(), ExportType::Payroll, archive)
            .unwrap()
    }

    #[test]
    fn test_entries_sorted_and_indexed() {
        let built = build(&sample_export());
        let paths: Vec<_> = built.manifest.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "employees.json", "payroll/2024-03.csv"]);
        let indices: Vec<_> = built.manifest.files().iter().map(|f| f.merkle_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(built.manifest.files()[0].hash, hash_bytes(b"March payroll export\n"));
    }

    #[test]
    fn test_root_and_hash_match_independent_computation() {
        let built = build(&sample_export());
        let leaves: Vec<_> = built.manifest.files().iter().map(|f| f.hash).collect();
        assert_eq!(built.manifest.merkle_root(), build_merkle_root(&leaves).unwrap());
        assert_eq!(
            built.manifest_hash,
            hash_bytes(built.manifest.to_canonical_json().unwrap().as_bytes())
        );
    }

    #[test]
    fn test_empty_archive_rejected() {
        let only_dirs = zip_bytes(&[("empty/", b"")]);
        let err = builder()
            .build_manifest(ExportId::new(), OrganizationId::new(), ExportType::Data, &only_dirs)
            .unwrap_err();
        assert_eq!(err, ManifestError::EmptyArchive);
    }

    #[test]
    fn test_untouched_archive_verifies() {
        let archive = sample_export();
        let built = build(&archive);
        let result = builder().verify_manifest(&built.manifest, &archive).unwrap();
        assert!(result.is_valid);
        assert!(result.merkle_root_match);
        assert!(result.invalid_files.is_empty());
    }

    #[test]
    fn test_tampered_file_is_reported() {
        let archive = sample_export();
        let built = build(&archive);
        let tampered = tamper_entry(&archive, "employees.json");

        let result = builder().verify_manifest(&built.manifest, &tampered).unwrap();
        assert!(!result.is_valid);
        assert!(!result.merkle_root_match);
        assert_eq!(result.invalid_files, vec!["employees.json (hash mismatch)"]);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let archive = sample_export();
        let built = build(&archive);
        let smaller = zip_bytes(&[
            ("README.md", b"March payroll export\n"),
            ("employees.json", br#"[{"id":1,"name":"A. Example"}]"#),
        ]);

        let result = builder().verify_manifest(&built.manifest, &smaller).unwrap();
        assert_eq!(result.invalid_files, vec!["payroll/2024-03.csv (missing in ZIP)"]);
        assert!(!result.merkle_root_match);
    }
}
