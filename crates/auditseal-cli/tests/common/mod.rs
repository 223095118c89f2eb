#![allow(dead_code)]

use std::sync::Arc;

use auditseal_common_core::{ExportId, OrganizationId, RetentionYears, SigningKeyId};
use auditseal_crypto::{signing_message, Ed25519Signer, Sha256Hash, Sha256Hasher, SigningProvider};
use auditseal_hardening::{assemble_package, SignedAuditPackage};
use auditseal_keys::ManifestSignature;
use auditseal_manifest::{ExportType, ManifestBuilder};
use auditseal_test_utils::archive::{entry_names, read_entry, zip_bytes};
use auditseal_test_utils::tsa::granted_response;
use auditseal_timestamp::{parse_response, Rfc3161Timestamp};
use chrono::{Duration, Utc};

/// A signed, timestamped package around `export`, as the pipeline builds it.
pub fn package(export_type: ExportType, export: &[u8]) -> Vec<u8> {
    let built = ManifestBuilder::new(Arc::new(Sha256Hasher))
        .build_manifest(ExportId::new(), OrganizationId::new(), export_type, export)
        .unwrap();
    let merkle_root = built.manifest.merkle_root();
    let signature = sign(&built.manifest_hash, &merkle_root);
    let timestamp = timestamp(&built.manifest_hash);

    let signed = SignedAuditPackage {
        manifest: built.manifest,
        manifest_hash: built.manifest_hash,
        signature: ManifestSignature {
            signature,
            key_id: SigningKeyId::new(),
            key_version: 1,
            signed_at: Utc::now(),
        },
        timestamp,
        retention_years: RetentionYears::DEFAULT,
        s3_key: None,
    };
    assemble_package(export, &signed).unwrap()
}

pub fn sign(
    manifest_hash: &Sha256Hash,
    merkle_root: &Sha256Hash,
) -> auditseal_crypto::Ed25519Signature {
    let pair = Ed25519Signer.generate_key_pair().unwrap();
    Ed25519Signer
        .sign(&signing_message(manifest_hash, merkle_root), &pair.private_key_pem)
        .unwrap()
}

/// A token from a synthetic authority, issued a minute ago.
pub fn timestamp(imprint: &Sha256Hash) -> Rfc3161Timestamp {
    let gen_time = (Utc::now() - Duration::minutes(1))
        .format("%Y%m%d%H%M%SZ")
        .to_string();
    let der = granted_response(imprint.as_bytes(), &gen_time);
    let response = parse_response(&der).unwrap();
    Rfc3161Timestamp::from_der(&der, response.gen_time, "Test TSA").unwrap()
}

/// Rebuild `archive` with `name` replaced (or dropped when `content` is `None`).
pub fn replace_entry(archive: &[u8], name: &str, content: Option<&[u8]>) -> Vec<u8> {
    let entries: Vec<(String, Vec<u8>)> = entry_names(archive)
        .into_iter()
        .filter_map(|entry| {
            if entry == name {
                content.map(|c| (entry, c.to_vec()))
            } else {
                let data = read_entry(archive, &entry).unwrap_or_default();
                Some((entry, data))
            }
        })
        .collect();
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    zip_bytes(&borrowed)
}
