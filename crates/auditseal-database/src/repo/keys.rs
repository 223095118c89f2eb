use auditseal_common_core::{OrganizationId, SigningKeyId};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::error::DatabaseError;
use crate::models::{NewSigningKey, SigningKeyRecord};

/// `signing_keys` access. Old versions are deactivated, never removed.
#[derive(Clone)]
pub struct SigningKeyRepository {
    pool: SqlitePool,
}

impl SigningKeyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn active(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<SigningKeyRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, SigningKeyRecord>(
            "SELECT * FROM signing_keys WHERE organization_id = ? AND is_active = 1",
        )
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn get(&self, id: SigningKeyId) -> Result<Option<SigningKeyRecord>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, SigningKeyRecord>("SELECT * FROM signing_keys WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn by_version(
        &self,
        organization_id: OrganizationId,
        version: i64,
    ) -> Result<Option<SigningKeyRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, SigningKeyRecord>(
            "SELECT * FROM signing_keys WHERE organization_id = ? AND version = ?",
        )
        .bind(organization_id.to_string())
        .bind(version)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Full history, oldest version first.
    pub async fn all(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<SigningKeyRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, SigningKeyRecord>(
            "SELECT * FROM signing_keys WHERE organization_id = ? ORDER BY version",
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert(
        tx: &mut Transaction<'_, Sqlite>,
        organization_id: OrganizationId,
        key: &NewSigningKey,
        version: i64,
    ) -> Result<SigningKeyId, DatabaseError> {
        let id = SigningKeyId::new();
        sqlx::query(
            "INSERT INTO signing_keys
             (id, organization_id, public_key, fingerprint, version, is_active,
              created_at, rotated_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, NULL)",
        )
        .bind(id.to_string())
        .bind(organization_id.to_string())
        .bind(&key.public_key)
        .bind(&key.fingerprint)
        .bind(version)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::from_write(e, "insert signing key"))?;
        Ok(id)
    }

    /// Version 1 for an organization without keys. A concurrent creator
    /// loses with [`DatabaseError::Conflict`].
    pub async fn insert_initial(
        &self,
        organization_id: OrganizationId,
        key: &NewSigningKey,
    ) -> Result<SigningKeyRecord, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let id = Self::insert(&mut tx, organization_id, key, 1).await?;
        tx.commit().await?;
        info!(%organization_id, fingerprint = %key.fingerprint, "created signing key v1");

        self.get(id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("signing_key", id))
    }

    /// Deactivate the active key and insert `key` as the next version,
    /// atomically. Returns `(archived, new)`.
    pub async fn rotate(
        &self,
        organization_id: OrganizationId,
        key: &NewSigningKey,
    ) -> Result<(SigningKeyRecord, SigningKeyRecord), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, SigningKeyRecord>(
            "SELECT * FROM signing_keys WHERE organization_id = ? AND is_active = 1",
        )
        .bind(organization_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::not_found("active signing key", organization_id))?;

        sqlx::query("UPDATE signing_keys SET is_active = 0, rotated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(current.id.to_string())
            .execute(&mut *tx)
            .await?;
        let new_id = Self::insert(&mut tx, organization_id, key, current.version + 1).await?;
        tx.commit().await?;

        info!(
            %organization_id,
            from_version = current.version,
            to_version = current.version + 1,
            "rotated signing key"
        );

        let archived = self
            .get(current.id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("signing_key", current.id))?;
        let new = self
            .get(new_id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("signing_key", new_id))?;
        Ok((archived, new))
    }
}
