//! Layout of a hardened package archive.
//!
//! ```text
//! export.zip             original export, unmodified
//! audit/manifest.json    pretty manifest
//! audit/signature.json   {algorithm, signature, publicKey, signedAt}
//! audit/timestamp.json   {token, timestamp, authority}
//! audit/timestamp.tsr    DER TimeStampResp
//! audit/README.txt       manual verification steps
//! ```

use auditseal_common_core::RetentionYears;
use auditseal_crypto::Sha256Hash;
use auditseal_keys::ManifestSignature;
use auditseal_manifest::{AuditManifest, ArchiveReader};
use auditseal_timestamp::Rfc3161Timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PackageError;

pub const EXPORT_ENTRY: &str = "export.zip";
pub const MANIFEST_ENTRY: &str = "audit/manifest.json";
pub const SIGNATURE_ENTRY: &str = "audit/signature.json";
pub const TIMESTAMP_ENTRY: &str = "audit/timestamp.json";
pub const TIMESTAMP_TOKEN_ENTRY: &str = "audit/timestamp.tsr";
pub const README_ENTRY: &str = "audit/README.txt";

pub const SIGNATURE_ALGORITHM: &str = "Ed25519";

pub const README_TEXT: &str = "\
AUDIT PACKAGE
=============

This archive is a tamper-evident audit package. It contains:

  export.zip            The original export, unmodified.
  audit/manifest.json   Every file of export.zip with its SHA-256 hash, size
                        and Merkle index, plus the Merkle root.
  audit/signature.json  Ed25519 signature of the organization over the
                        manifest hash and the Merkle root.
  audit/timestamp.json  RFC 3161 timestamp issued by a Time-Stamp Authority
                        over the manifest hash.
  audit/timestamp.tsr   The raw RFC 3161 reply (DER).

MANUAL VERIFICATION
-------------------

1. File hashes
   Extract export.zip and compute SHA-256 of every file, for example
   `sha256sum <file>`. Each digest must equal the `hash` listed for the
   file in audit/manifest.json.

2. Merkle root
   Order the file hashes by `merkleIndex` (this is path order). Repeatedly
   pair adjacent hashes left to right and replace each pair by SHA-256 of
   the 64 raw bytes of both digests concatenated (not their hex text). If
   a level has an odd number of hashes, pair the last one with itself.
   The single remaining hash must equal `merkleRoot`.

3. Manifest hash
   Serialize the manifest canonically, without whitespace and with fields
   in this order: version, exportId, organizationId, exportType,
   createdAt, merkleRoot, files. Each file carries only path, hash and
   sizeBytes, sorted by path. The SHA-256 of that text is the manifest
   hash.

4. Signature
   The signed message is the 32 raw bytes of the manifest hash followed by
   the 32 raw bytes of the Merkle root. Verify `signature` (base64) over
   that message with `publicKey` (base64 SubjectPublicKeyInfo DER).

5. Timestamp
   Inspect the TSA reply with
       openssl ts -reply -in audit/timestamp.tsr -text
   The message imprint must equal the manifest hash. Full validation
   additionally requires the authority's certificate chain:
       openssl ts -verify -digest <manifest hash> -in audit/timestamp.tsr \\
           -CAfile <tsa-ca.pem>

The `auditseal verify` command performs steps 1 to 5 offline.
";

/// Contents of `audit/signature.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDocument {
    pub algorithm: String,
    pub signature: String,
    pub public_key: String,
    pub signed_at: DateTime<Utc>,
}

/// A manifest with its signature and timestamp, ready to be packaged.
#[derive(Debug, Clone)]
pub struct SignedAuditPackage {
    pub manifest: AuditManifest,
    pub manifest_hash: Sha256Hash,
    pub signature: ManifestSignature,
    pub timestamp: Rfc3161Timestamp,
    pub retention_years: RetentionYears,
    pub s3_key: Option<String>,
}

impl SignedAuditPackage {
    /// `created_at + retention_years` of the manifest.
    pub fn retention_until(&self) -> DateTime<Utc> {
        self.retention_years.add_to(self.manifest.created_at())
    }

    pub fn signature_document(&self) -> SignatureDocument {
        SignatureDocument {
            algorithm: SIGNATURE_ALGORITHM.to_string(),
            signature: self.signature.signature.signature.clone(),
            public_key: self.signature.signature.public_key.clone(),
            signed_at: self.signature.signed_at,
        }
    }
}

fn to_pretty<T: Serialize>(entry: &'static str, value: &T) -> Result<Vec<u8>, PackageError> {
    serde_json::to_vec_pretty(value).map_err(|e| PackageError::Malformed {
        entry,
        message: e.to_string(),
    })
}

/// Write the package archive around `export`, deflated at maximum level.
pub fn assemble_package(
    export: &[u8],
    package: &SignedAuditPackage,
) -> Result<Vec<u8>, PackageError> {
    let entries: [(&str, Vec<u8>); 6] = [
        (EXPORT_ENTRY, export.to_vec()),
        (MANIFEST_ENTRY, package.manifest.to_pretty_json()?.into_bytes()),
        (SIGNATURE_ENTRY, to_pretty(SIGNATURE_ENTRY, &package.signature_document())?),
        (TIMESTAMP_ENTRY, to_pretty(TIMESTAMP_ENTRY, &package.timestamp)?),
        (TIMESTAMP_TOKEN_ENTRY, package.timestamp.token_bytes()?),
        (README_ENTRY, README_TEXT.as_bytes().to_vec()),
    ];

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .unix_permissions(0o644);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in &entries {
        writer.start_file(*name, options)?;
        writer.write_all(content)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// A package archive opened for offline inspection.
#[derive(Debug, Clone)]
pub struct PackageContents {
    pub export: Vec<u8>,
    pub manifest: AuditManifest,
    pub signature: SignatureDocument,
    pub timestamp: Rfc3161Timestamp,
    pub timestamp_token: Vec<u8>,
}

fn require(reader: &mut ArchiveReader<'_>, entry: &'static str) -> Result<Vec<u8>, PackageError> {
    reader.read(entry)?.ok_or(PackageError::MissingEntry(entry))
}

fn parse_json<T: serde::de::DeserializeOwned>(
    entry: &'static str,
    bytes: &[u8],
) -> Result<T, PackageError> {
    serde_json::from_slice(bytes).map_err(|e| PackageError::Malformed {
        entry,
        message: e.to_string(),
    })
}

impl PackageContents {
    pub fn open(bytes: &[u8]) -> Result<Self, PackageError> {
        let mut reader = ArchiveReader::open(bytes)?;
        let export = require(&mut reader, EXPORT_ENTRY)?;

        let manifest_bytes = require(&mut reader, MANIFEST_ENTRY)?;
        let manifest_text = String::from_utf8(manifest_bytes).map_err(|e| PackageError::Malformed {
            entry: MANIFEST_ENTRY,
            message: e.to_string(),
        })?;
        let manifest = AuditManifest::from_pretty_json(&manifest_text)?;

        let signature = parse_json(SIGNATURE_ENTRY, &require(&mut reader, SIGNATURE_ENTRY)?)?;
        let timestamp = parse_json(TIMESTAMP_ENTRY, &require(&mut reader, TIMESTAMP_ENTRY)?)?;
        let timestamp_token = require(&mut reader, TIMESTAMP_TOKEN_ENTRY)?;

        Ok(Self {
            export,
            manifest,
            signature,
            timestamp,
            timestamp_token,
        })
    }
}
