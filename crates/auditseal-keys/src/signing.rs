//! Manifest signing bound to key versions.

use auditseal_common_core::{AuditError, OrganizationId, Result, SigningKeyId};
use auditseal_crypto::{
    public_key_pem_to_base64, signing_message, Ed25519Signature, Sha256Hash, SigningProvider,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::manager::KeyManager;

/// A manifest signature and the key version that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSignature {
    pub signature: Ed25519Signature,
    pub key_id: SigningKeyId,
    pub key_version: i64,
    pub signed_at: DateTime<Utc>,
}

/// Signs `manifest_hash || merkle_root` with the organization's active key.
#[derive(Clone)]
pub struct SigningService {
    signer: Arc<dyn SigningProvider>,
    keys: Arc<KeyManager>,
}

impl SigningService {
    pub fn new(signer: Arc<dyn SigningProvider>, keys: Arc<KeyManager>) -> Self {
        Self { signer, keys }
    }

    pub fn key_manager(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub async fn sign_manifest(
        &self,
        organization_id: OrganizationId,
        manifest_hash: &Sha256Hash,
        merkle_root: &Sha256Hash,
    ) -> Result<ManifestSignature> {
        let key = self.keys.get_or_create_signing_key(organization_id).await?;
        let private_key = self.keys.private_key(&key).await?;

        let message = signing_message(manifest_hash, merkle_root);
        let signature = self.signer.sign(&message, &private_key)?;

        // The secret must belong to the row we are about to record.
        let recorded = public_key_pem_to_base64(&key.public_key)?;
        if signature.public_key != recorded {
            return Err(AuditError::integrity(
                "signing key",
                key.fingerprint,
                "secret store key with a different public half",
            ));
        }

        info!(
            %organization_id,
            key_version = key.version,
            manifest_hash = %manifest_hash,
            "manifest signed"
        );
        Ok(ManifestSignature {
            signature,
            key_id: key.id,
            key_version: key.version,
            signed_at: Utc::now(),
        })
    }

    /// Verify against the public key of `key_version`, which may be archived.
    pub async fn verify_with_key_version(
        &self,
        organization_id: OrganizationId,
        key_version: i64,
        manifest_hash: &Sha256Hash,
        merkle_root: &Sha256Hash,
        signature_b64: &str,
    ) -> Result<bool> {
        let key = self.keys.key_version(organization_id, key_version).await?;
        let message = signing_message(manifest_hash, merkle_root);
        let valid = self
            .signer
            .verify_with_public_key(&message, signature_b64, &key.public_key);
        debug!(%organization_id, key_version, valid, "manifest signature checked");
        Ok(valid)
    }
}
