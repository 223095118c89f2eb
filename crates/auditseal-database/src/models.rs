//! Row types.
//!
//! Identifiers and enums are stored as TEXT; hashes stay as the stored text
//! so that verification can report malformed values instead of failing to
//! load them.

use auditseal_common_core::{
    ExportId, LockMode, OrganizationId, PackageId, RetentionYears, SigningKeyId, VerificationLogId,
};
use auditseal_manifest::ExportType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a hardening attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Pending,
    BuildingManifest,
    Signing,
    Timestamping,
    Uploading,
    Completed,
    Failed,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::BuildingManifest => "building_manifest",
            Self::Signing => "signing",
            Self::Timestamping => "timestamping",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The state after this one on the success path.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::BuildingManifest),
            Self::BuildingManifest => Some(Self::Signing),
            Self::Signing => Some(Self::Timestamping),
            Self::Timestamping => Some(Self::Uploading),
            Self::Uploading => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Forward by exactly one step, or to `Failed` from any non-terminal state.
    pub fn can_transition_to(&self, to: PackageStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "building_manifest" => Self::BuildingManifest,
            "signing" => Self::Signing,
            "timestamping" => Self::Timestamping,
            "uploading" => Self::Uploading,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => return Err(format!("unknown package status: {other}")),
        })
    }
}

fn parse<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.to_string().into(),
    })
}

fn parse_opt<T>(row: &SqliteRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|v| {
        v.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: e.to_string().into(),
        })
    })
    .transpose()
}

fn retention(row: &SqliteRow, column: &str) -> Result<RetentionYears, sqlx::Error> {
    let years: i64 = row.try_get(column)?;
    u32::try_from(years)
        .ok()
        .and_then(|y| RetentionYears::new(y).ok())
        .ok_or_else(|| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: format!("retention out of range: {years}").into(),
        })
}

/// Per-organization audit settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfigRecord {
    pub organization_id: OrganizationId,
    pub retention_years: RetentionYears,
    pub lock_mode: LockMode,
    /// Overrides the default bucket.
    pub bucket: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for AuditConfigRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            organization_id: parse(row, "organization_id")?,
            retention_years: retention(row, "retention_years")?,
            lock_mode: parse(row, "lock_mode")?,
            bucket: row.try_get("bucket")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A hardening attempt and, once completed, its crypto bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub id: PackageId,
    pub organization_id: OrganizationId,
    pub export_id: ExportId,
    pub export_type: ExportType,
    pub status: PackageStatus,
    pub error_message: Option<String>,
    pub manifest_json: Option<String>,
    pub manifest_hash: Option<String>,
    pub merkle_root: Option<String>,
    pub file_count: Option<i64>,
    pub total_size_bytes: Option<i64>,
    pub signature_value: Option<String>,
    /// Base64 SPKI DER of the signing key.
    pub signature_public_key: Option<String>,
    pub signing_key_id: Option<SigningKeyId>,
    pub signing_key_version: Option<i64>,
    pub signed_at: Option<DateTime<Utc>>,
    pub timestamp_token: Option<String>,
    pub timestamp_at: Option<DateTime<Utc>>,
    pub timestamp_authority: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_key: Option<String>,
    pub retention_years: RetentionYears,
    pub retention_until: Option<DateTime<Utc>>,
    pub object_lock_enabled: bool,
    pub lock_mode: Option<LockMode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, SqliteRow> for PackageRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: parse(row, "id")?,
            organization_id: parse(row, "organization_id")?,
            export_id: parse(row, "export_id")?,
            export_type: parse(row, "export_type")?,
            status: parse(row, "status")?,
            error_message: row.try_get("error_message")?,
            manifest_json: row.try_get("manifest_json")?,
            manifest_hash: row.try_get("manifest_hash")?,
            merkle_root: row.try_get("merkle_root")?,
            file_count: row.try_get("file_count")?,
            total_size_bytes: row.try_get("total_size_bytes")?,
            signature_value: row.try_get("signature_value")?,
            signature_public_key: row.try_get("signature_public_key")?,
            signing_key_id: parse_opt(row, "signing_key_id")?,
            signing_key_version: row.try_get("signing_key_version")?,
            signed_at: row.try_get("signed_at")?,
            timestamp_token: row.try_get("timestamp_token")?,
            timestamp_at: row.try_get("timestamp_at")?,
            timestamp_authority: row.try_get("timestamp_authority")?,
            s3_bucket: row.try_get("s3_bucket")?,
            s3_key: row.try_get("s3_key")?,
            retention_years: retention(row, "retention_years")?,
            retention_until: row.try_get("retention_until")?,
            object_lock_enabled: row.try_get("object_lock_enabled")?,
            lock_mode: parse_opt(row, "lock_mode")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

/// Input for a new `pending` package row.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub id: PackageId,
    pub organization_id: OrganizationId,
    pub export_id: ExportId,
    pub export_type: ExportType,
    pub retention_years: RetentionYears,
}

/// One file of a stored package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFileRecord {
    pub path: String,
    pub hash: String,
    pub size_bytes: i64,
    pub merkle_index: i64,
}

impl<'r> FromRow<'r, SqliteRow> for PackageFileRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            path: row.try_get("path")?,
            hash: row.try_get("hash")?,
            size_bytes: row.try_get("size_bytes")?,
            merkle_index: row.try_get("merkle_index")?,
        })
    }
}

/// Everything persisted when a package completes.
#[derive(Debug, Clone)]
pub struct CompletedPackage {
    pub manifest_json: String,
    pub manifest_hash: String,
    pub merkle_root: String,
    pub file_count: i64,
    pub total_size_bytes: i64,
    pub signature_value: String,
    pub signature_public_key: String,
    pub signing_key_id: SigningKeyId,
    pub signing_key_version: i64,
    pub signed_at: DateTime<Utc>,
    pub timestamp_token: String,
    pub timestamp_at: DateTime<Utc>,
    pub timestamp_authority: String,
    pub s3_bucket: String,
    pub s3_key: String,
    pub retention_until: DateTime<Utc>,
    pub object_lock_enabled: bool,
    pub lock_mode: Option<LockMode>,
    pub files: Vec<PackageFileRecord>,
}

/// A versioned organization signing key. The private half never lives here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKeyRecord {
    pub id: SigningKeyId,
    pub organization_id: OrganizationId,
    /// SPKI PEM.
    pub public_key: String,
    pub fingerprint: String,
    pub version: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, SqliteRow> for SigningKeyRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: parse(row, "id")?,
            organization_id: parse(row, "organization_id")?,
            public_key: row.try_get("public_key")?,
            fingerprint: row.try_get("fingerprint")?,
            version: row.try_get("version")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            rotated_at: row.try_get("rotated_at")?,
        })
    }
}

/// Public half of a freshly generated key.
#[derive(Debug, Clone)]
pub struct NewSigningKey {
    pub public_key: String,
    pub fingerprint: String,
}

/// Who asked for a verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequester {
    pub actor_id: Option<String>,
    /// e.g. `api`, `cli`, `scheduled`.
    pub source: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A persisted verification attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationLogRecord {
    pub id: VerificationLogId,
    pub package_id: PackageId,
    pub organization_id: OrganizationId,
    pub is_valid: bool,
    pub checks_performed: Vec<String>,
    pub checks_passed: Vec<String>,
    pub checks_failed: Vec<String>,
    /// Structured detail per failed check, keyed by check name.
    pub error_details: serde_json::Value,
    pub requester: VerificationRequester,
    pub verified_at: DateTime<Utc>,
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &SqliteRow,
    column: &str,
) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, SqliteRow> for VerificationLogRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: parse(row, "id")?,
            package_id: parse(row, "package_id")?,
            organization_id: parse(row, "organization_id")?,
            is_valid: row.try_get("is_valid")?,
            checks_performed: json_column(row, "checks_performed")?,
            checks_passed: json_column(row, "checks_passed")?,
            checks_failed: json_column(row, "checks_failed")?,
            error_details: json_column(row, "error_details")?,
            requester: VerificationRequester {
                actor_id: row.try_get("actor_id")?,
                source: row.try_get("source")?,
                ip_address: row.try_get("ip_address")?,
                user_agent: row.try_get("user_agent")?,
            },
            verified_at: row.try_get("verified_at")?,
        })
    }
}
