//! Key custody and rotation.

use auditseal_common_core::{AuditError, OrganizationId, Result};
use auditseal_common_secret::{SecretStore, SecretString};
use auditseal_crypto::{GeneratedKeyPair, SigningProvider};
use auditseal_database::{DatabaseError, NewSigningKey, SigningKeyRecord, SigningKeyRepository};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Secret store prefix of organization private keys.
pub const SIGNING_KEY_SECRET_PATH: &str = "audit/signing-key";

/// Secret store path of the private half of the key with `fingerprint`.
///
/// Every keypair has its own path, so a write for a key whose row never
/// commits cannot replace the secret of the active key.
pub fn signing_key_secret_path(fingerprint: &str) -> String {
    format!("{SIGNING_KEY_SECRET_PATH}/{fingerprint}")
}

/// Resolves, creates and rotates organization signing keys.
///
/// Creation and rotation for one organization are serialized in-process.
/// Across processes the database decides the winner; the loser's secret is
/// left orphaned under its own fingerprint.
pub struct KeyManager {
    signer: Arc<dyn SigningProvider>,
    secrets: Arc<dyn SecretStore>,
    keys: SigningKeyRepository,
    org_locks: Mutex<HashMap<OrganizationId, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyManager {
    pub fn new(
        signer: Arc<dyn SigningProvider>,
        secrets: Arc<dyn SecretStore>,
        keys: SigningKeyRepository,
    ) -> Self {
        Self {
            signer,
            secrets,
            keys,
            org_locks: Mutex::new(HashMap::new()),
        }
    }

    fn org_lock(&self, organization_id: OrganizationId) -> Arc<tokio::sync::Mutex<()>> {
        self.org_locks
            .lock()
            .entry(organization_id)
            .or_default()
            .clone()
    }

    fn public_half(pair: &GeneratedKeyPair) -> NewSigningKey {
        NewSigningKey {
            public_key: pair.public_key_pem.clone(),
            fingerprint: pair.fingerprint.clone(),
        }
    }

    /// New keypair with its private half already in the secret store.
    async fn generate_and_store(&self, organization_id: OrganizationId) -> Result<NewSigningKey> {
        let pair = self.signer.generate_key_pair()?;
        let public = Self::public_half(&pair);
        self.secrets
            .store_secret(
                organization_id,
                &signing_key_secret_path(&pair.fingerprint),
                pair.private_key_pem,
            )
            .await?;
        Ok(public)
    }

    /// The active key, creating version 1 when the organization has none.
    #[instrument(skip(self))]
    pub async fn get_or_create_signing_key(
        &self,
        organization_id: OrganizationId,
    ) -> Result<SigningKeyRecord> {
        if let Some(active) = self.keys.active(organization_id).await? {
            return Ok(active);
        }

        let lock = self.org_lock(organization_id);
        let _guard = lock.lock().await;
        if let Some(active) = self.keys.active(organization_id).await? {
            return Ok(active);
        }

        let public = self.generate_and_store(organization_id).await?;

        match self.keys.insert_initial(organization_id, &public).await {
            Ok(record) => {
                info!(%organization_id, fingerprint = %record.fingerprint, "signing key created");
                Ok(record)
            }
            Err(DatabaseError::Conflict(_)) => {
                warn!(%organization_id, "signing key created concurrently, using the stored one");
                self.keys
                    .active(organization_id)
                    .await?
                    .ok_or_else(|| AuditError::not_found("signing key", organization_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Archive the active key and activate a fresh one at the next version.
    ///
    /// The archived public half stays in the database for verifying older
    /// packages. If the rotation does not commit, the previous key stays active
    /// together with its secret.
    #[instrument(skip(self))]
    pub async fn rotate_key(&self, organization_id: OrganizationId) -> Result<SigningKeyRecord> {
        let lock = self.org_lock(organization_id);
        let _guard = lock.lock().await;

        let current = self
            .keys
            .active(organization_id)
            .await?
            .ok_or_else(|| AuditError::not_found("signing key", organization_id))?;

        let public = self.generate_and_store(organization_id).await?;
        let (archived, active) = self.keys.rotate(organization_id, &public).await?;

        info!(
            %organization_id,
            from_version = current.version,
            archived_fingerprint = %archived.fingerprint,
            to_version = active.version,
            fingerprint = %active.fingerprint,
            "signing key rotated"
        );
        Ok(active)
    }

    /// Every key version of the organization, oldest first.
    pub async fn get_all_keys(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<SigningKeyRecord>> {
        Ok(self.keys.all(organization_id).await?)
    }

    /// A specific key version, active or archived.
    pub async fn key_version(
        &self,
        organization_id: OrganizationId,
        version: i64,
    ) -> Result<SigningKeyRecord> {
        self.keys
            .by_version(organization_id, version)
            .await?
            .ok_or_else(|| {
                AuditError::not_found("signing key", format!("{organization_id} v{version}"))
            })
    }

    /// Private half of `key`.
    pub(crate) async fn private_key(&self, key: &SigningKeyRecord) -> Result<SecretString> {
        self.secrets
            .get_secret(key.organization_id, &signing_key_secret_path(&key.fingerprint))
            .await?
            .ok_or_else(|| AuditError::not_found("signing key secret", &key.fingerprint))
    }
}
