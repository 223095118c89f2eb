//! Manifest model and its two serialisations.
//!
//! The canonical form is what gets hashed and signed: fixed field order,
//! files sorted by path with only `path`, `hash` and `sizeBytes`, and no
//! whitespace. The pretty form is what auditors read inside the package and
//! additionally carries `fileCount`, `totalSizeBytes` and each `merkleIndex`.

use auditseal_common_core::{ExportId, OrganizationId};
use auditseal_crypto::Sha256Hash;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ManifestError;

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// Kind of export being hardened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportType {
    Data,
    Payroll,
    AuditPack,
}

impl ExportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Payroll => "payroll",
            Self::AuditPack => "audit_pack",
        }
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(Self::Data),
            "payroll" => Ok(Self::Payroll),
            "audit_pack" => Ok(Self::AuditPack),
            other => Err(format!("unknown export type: {other}")),
        }
    }
}

/// One hashed file of the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFileEntry {
    pub path: String,
    pub hash: Sha256Hash,
    pub size_bytes: u64,
    /// Position in the path-sorted leaf order of the Merkle tree.
    pub merkle_index: u32,
}

/// Immutable description of an export's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditManifest {
    version: String,
    export_id: ExportId,
    organization_id: OrganizationId,
    export_type: ExportType,
    created_at: DateTime<Utc>,
    files: Vec<AuditFileEntry>,
    merkle_root: Sha256Hash,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalFile<'a> {
    path: &'a str,
    hash: &'a Sha256Hash,
    size_bytes: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalManifest<'a> {
    version: &'a str,
    export_id: ExportId,
    organization_id: OrganizationId,
    export_type: ExportType,
    created_at: String,
    merkle_root: &'a Sha256Hash,
    files: Vec<CanonicalFile<'a>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrettyManifest {
    version: String,
    export_id: ExportId,
    organization_id: OrganizationId,
    export_type: ExportType,
    created_at: DateTime<Utc>,
    merkle_root: Sha256Hash,
    #[serde(default)]
    file_count: usize,
    #[serde(default)]
    total_size_bytes: u64,
    files: Vec<AuditFileEntry>,
}

impl AuditManifest {
    /// Assemble a manifest, rejecting empty file lists, empty paths and
    /// duplicate paths. `created_at` is kept at millisecond precision so the
    /// canonical form survives a round trip through the pretty form.
    pub fn new(
        export_id: ExportId,
        organization_id: OrganizationId,
        export_type: ExportType,
        created_at: DateTime<Utc>,
        files: Vec<AuditFileEntry>,
        merkle_root: Sha256Hash,
    ) -> Result<Self, ManifestError> {
        if files.is_empty() {
            return Err(ManifestError::EmptyArchive);
        }
        let mut seen = HashSet::with_capacity(files.len());
        for file in &files {
            if file.path.is_empty() {
                return Err(ManifestError::EmptyPath);
            }
            if !seen.insert(file.path.as_str()) {
                return Err(ManifestError::DuplicatePath(file.path.clone()));
            }
        }

        Ok(Self {
            version: MANIFEST_VERSION.to_string(),
            export_id,
            organization_id,
            export_type,
            created_at: created_at.trunc_subsecs(3),
            files,
            merkle_root,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn export_id(&self) -> ExportId {
        self.export_id
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn export_type(&self) -> ExportType {
        self.export_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn files(&self) -> &[AuditFileEntry] {
        &self.files
    }

    pub fn merkle_root(&self) -> Sha256Hash {
        self.merkle_root
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    /// Files ordered by `merkle_index`, the leaf order of the tree.
    pub fn files_in_merkle_order(&self) -> Vec<&AuditFileEntry> {
        let mut files: Vec<_> = self.files.iter().collect();
        files.sort_by_key(|f| f.merkle_index);
        files
    }

    /// The exact text that is hashed to obtain the manifest hash.
    pub fn to_canonical_json(&self) -> Result<String, ManifestError> {
        let mut files: Vec<_> = self
            .files
            .iter()
            .map(|f| CanonicalFile {
                path: &f.path,
                hash: &f.hash,
                size_bytes: f.size_bytes,
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(b.path));

        let canonical = CanonicalManifest {
            version: &self.version,
            export_id: self.export_id,
            organization_id: self.organization_id,
            export_type: self.export_type,
            created_at: format_instant(self.created_at),
            merkle_root: &self.merkle_root,
            files,
        };
        Ok(serde_json::to_string(&canonical)?)
    }

    /// Indented form written to `audit/manifest.json`.
    pub fn to_pretty_json(&self) -> Result<String, ManifestError> {
        let pretty = PrettyManifest {
            version: self.version.clone(),
            export_id: self.export_id,
            organization_id: self.organization_id,
            export_type: self.export_type,
            created_at: self.created_at,
            merkle_root: self.merkle_root,
            file_count: self.file_count(),
            total_size_bytes: self.total_size_bytes(),
            files: self.files.clone(),
        };
        Ok(serde_json::to_string_pretty(&pretty)?)
    }

    /// Parse the pretty form back, re-validating paths.
    pub fn from_pretty_json(json: &str) -> Result<Self, ManifestError> {
        let pretty: PrettyManifest = serde_json::from_str(json)?;
        let mut manifest = Self::new(
            pretty.export_id,
            pretty.organization_id,
            pretty.export_type,
            pretty.created_at,
            pretty.files,
            pretty.merkle_root,
        )?;
        manifest.version = pretty.version;
        Ok(manifest)
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditseal_crypto::{hash_str, Sha256Hash};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_case::test_case;

    fn entry(path: &str, index: u32) -> AuditFileEntry {
        AuditFileEntry {
            path: path.to_string(),
            hash: hash_str(path),
            size_bytes: path.len() as u64,
            merkle_index: index,
        }
    }

    fn manifest(files: Vec<AuditFileEntry>) -> AuditManifest {
        AuditManifest::new(
            ExportId::parse("6f1c1f8e-2f6e-4d8e-9a53-2f0c4e1b7a10").unwrap(),
            OrganizationId::parse("0b8f4d3a-96a5-4a53-a4f6-0f6d9b8a2c11").unwrap(),
            ExportType::Payroll,
            Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap(),
            files,
            Sha256Hash::from_bytes([7; 32]),
        )
        .unwrap()
    }

    #[test_case(ExportType::Data, "data")]
    #[test_case(ExportType::Payroll, "payroll")]
    #[test_case(ExportType::AuditPack, "audit_pack")]
    fn test_export_type_names(kind: ExportType, name: &str) {
        assert_eq!(kind.as_str(), name);
        assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{name}\""));
        assert_eq!(name.parse::<ExportType>().unwrap(), kind);
    }

    #[test]
    fn test_canonical_layout() {
        let m = manifest(vec![entry("a.txt", 0)]);
        let json = m.to_canonical_json().unwrap();
        let expected = format!(
            concat!(
                r#"{{"version":"1.0","exportId":"6f1c1f8e-2f6e-4d8e-9a53-2f0c4e1b7a10","#,
                r#""organizationId":"0b8f4d3a-96a5-4a53-a4f6-0f6d9b8a2c11","#,
                r#""exportType":"payroll","#,
                r#""createdAt":"2024-03-15T12:30:45.000Z","merkleRoot":"{}","#,
                r#""files":[{{"path":"a.txt","hash":"{}","sizeBytes":5}}]}}"#
            ),
            Sha256Hash::from_bytes([7; 32]),
            hash_str("a.txt"),
        );
        assert_eq!(json, expected);
        assert!(!json.contains("merkleIndex"));
    }

    #[test]
    fn test_canonical_is_insertion_order_invariant() {
        let sorted = manifest(vec![entry("a", 0), entry("b", 1), entry("c", 2)]);
        let shuffled = manifest(vec![entry("c", 2), entry("a", 0), entry("b", 1)]);
        assert_eq!(
            sorted.to_canonical_json().unwrap(),
            shuffled.to_canonical_json().unwrap()
        );
    }

    #[test]
    fn test_pretty_round_trip_keeps_canonical_form() {
        let m = manifest(vec![entry("b", 1), entry("a", 0)]);
        let pretty = m.to_pretty_json().unwrap();
        assert!(pretty.contains("\"fileCount\": 2"));
        assert!(pretty.contains("\"merkleIndex\": 1"));
        let back = AuditManifest::from_pretty_json(&pretty).unwrap();
        assert_eq!(back, m);
        assert_eq!(back.to_canonical_json().unwrap(), m.to_canonical_json().unwrap());
    }

    #[test]
    fn test_created_at_truncated_to_millis() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let m = AuditManifest::new(
            ExportId::new(),
            OrganizationId::new(),
            ExportType::Data,
            at,
            vec![entry("x", 0)],
            hash_str("x"),
        )
        .unwrap();
        assert_eq!(format_instant(m.created_at()), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_rejects_empty_duplicate_and_blank_paths() {
        let build = |files| {
            AuditManifest::new(
                ExportId::new(),
                OrganizationId::new(),
                ExportType::Data,
                Utc::now(),
                files,
                hash_str("r"),
            )
        };
        assert_eq!(build(vec![]).unwrap_err(), ManifestError::EmptyArchive);
        assert_eq!(
            build(vec![entry("a", 0), entry("a", 1)]).unwrap_err(),
            ManifestError::DuplicatePath("a".into())
        );
        assert_eq!(build(vec![entry("", 0)]).unwrap_err(), ManifestError::EmptyPath);
    }

    proptest! {
        #[test]
        fn prop_canonical_ignores_order(
            paths in prop::collection::hash_set("[a-z]{1,8}", 1..12),
            seed in any::<u64>(),
        ) {
            let mut files: Vec<_> = paths
                .iter()
                .enumerate()
                .map(|(i, p)| entry(p, i as u32))
                .collect();
            let reference = manifest(files.clone()).to_canonical_json().unwrap();
            let len = files.len();
            files.rotate_left((seed as usize) % len);
            files.reverse();
            prop_assert_eq!(manifest(files).to_canonical_json().unwrap(), reference);
        }
    }
}
