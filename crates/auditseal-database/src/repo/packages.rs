use auditseal_common_core::{ExportId, OrganizationId, PackageId};
use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

use crate::error::DatabaseError;
use crate::models::{CompletedPackage, NewPackage, PackageFileRecord, PackageRecord, PackageStatus};

/// `audit_export_packages` and `audit_export_files` access.
///
/// Rows are never deleted. Status changes are checked against
/// [`PackageStatus::can_transition_to`] inside the updating transaction.
#[derive(Clone)]
pub struct PackageRepository {
    pool: SqlitePool,
}

impl PackageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, package), fields(package_id = %package.id))]
    pub async fn insert_pending(
        &self,
        package: &NewPackage,
    ) -> Result<PackageRecord, DatabaseError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO audit_export_packages
             (id, organization_id, export_id, export_type, status, retention_years,
              object_lock_enabled, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(package.id.to_string())
        .bind(package.organization_id.to_string())
        .bind(package.export_id.to_string())
        .bind(package.export_type.as_str())
        .bind(PackageStatus::Pending.as_str())
        .bind(package.retention_years.get() as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, "insert package"))?;

        self.require(package.id).await
    }

    pub async fn get(&self, id: PackageId) -> Result<Option<PackageRecord>, DatabaseError> {
        Ok(
            sqlx::query_as::<_, PackageRecord>("SELECT * FROM audit_export_packages WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// The package, provided it belongs to `organization_id`.
    pub async fn get_for_organization(
        &self,
        id: PackageId,
        organization_id: OrganizationId,
    ) -> Result<Option<PackageRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, PackageRecord>(
            "SELECT * FROM audit_export_packages WHERE id = ? AND organization_id = ?",
        )
        .bind(id.to_string())
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn require(&self, id: PackageId) -> Result<PackageRecord, DatabaseError> {
        self.get(id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("package", id))
    }

    /// Newest first.
    pub async fn list_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<PackageRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, PackageRecord>(
            "SELECT * FROM audit_export_packages WHERE organization_id = ?
             ORDER BY created_at DESC, id",
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?)
    }

    /// Every attempt for one export, oldest first.
    pub async fn list_for_export(
        &self,
        organization_id: OrganizationId,
        export_id: ExportId,
    ) -> Result<Vec<PackageRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, PackageRecord>(
            "SELECT * FROM audit_export_packages WHERE organization_id = ? AND export_id = ?
             ORDER BY created_at, id",
        )
        .bind(organization_id.to_string())
        .bind(export_id.to_string())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn lock_status(
        tx: &mut Transaction<'_, Sqlite>,
        id: PackageId,
        to: PackageStatus,
    ) -> Result<(), DatabaseError> {
        let row = sqlx::query("SELECT status FROM audit_export_packages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("package", id))?;
        let raw: String = row.try_get("status")?;
        let from: PackageStatus = raw.parse().map_err(|message| DatabaseError::Decode {
            column: "status",
            message,
        })?;
        if !from.can_transition_to(to) {
            return Err(DatabaseError::InvalidTransition { from, to });
        }
        Ok(())
    }

    /// Move to `to`, which must be the next success-path state.
    pub async fn update_status(
        &self,
        id: PackageId,
        to: PackageStatus,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_status(&mut tx, id, to).await?;
        sqlx::query("UPDATE audit_export_packages SET status = ?, updated_at = ? WHERE id = ?")
            .bind(to.as_str())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(package_id = %id, status = %to, "package status updated");
        Ok(())
    }

    /// Terminal failure with the captured message.
    pub async fn mark_failed(&self, id: PackageId, message: &str) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_status(&mut tx, id, PackageStatus::Failed).await?;
        sqlx::query(
            "UPDATE audit_export_packages
             SET status = ?, error_message = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(PackageStatus::Failed.as_str())
        .bind(message)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Store the crypto bundle and file rows, and mark the package completed.
    #[instrument(skip(self, completed), fields(package_id = %id, files = completed.files.len()))]
    pub async fn complete(
        &self,
        id: PackageId,
        completed: &CompletedPackage,
    ) -> Result<PackageRecord, DatabaseError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        Self::lock_status(&mut tx, id, PackageStatus::Completed).await?;

        sqlx::query(
            "UPDATE audit_export_packages SET
                status = ?, manifest_json = ?, manifest_hash = ?, merkle_root = ?,
                file_count = ?, total_size_bytes = ?, signature_value = ?, signature_public_key = ?,
                signing_key_id = ?, signing_key_version = ?, signed_at = ?, timestamp_token = ?,
                timestamp_at = ?, timestamp_authority = ?, s3_bucket = ?, s3_key = ?,
                retention_until = ?, object_lock_enabled = ?, lock_mode = ?,
                updated_at = ?, completed_at = ?
             WHERE id = ?",
        )
        .bind(PackageStatus::Completed.as_str())
        .bind(&completed.manifest_json)
        .bind(&completed.manifest_hash)
        .bind(&completed.merkle_root)
        .bind(completed.file_count)
        .bind(completed.total_size_bytes)
        .bind(&completed.signature_value)
        .bind(&completed.signature_public_key)
        .bind(completed.signing_key_id.to_string())
        .bind(completed.signing_key_version)
        .bind(completed.signed_at)
        .bind(&completed.timestamp_token)
        .bind(completed.timestamp_at)
        .bind(&completed.timestamp_authority)
        .bind(&completed.s3_bucket)
        .bind(&completed.s3_key)
        .bind(completed.retention_until)
        .bind(completed.object_lock_enabled)
        .bind(completed.lock_mode.map(|m| m.as_str()))
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        for file in &completed.files {
            sqlx::query(
                "INSERT INTO audit_export_files (package_id, path, hash, size_bytes, merkle_index)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id.to_string())
            .bind(&file.path)
            .bind(&file.hash)
            .bind(file.size_bytes)
            .bind(file.merkle_index)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_write(e, "insert package file"))?;
        }
        tx.commit().await?;

        self.require(id).await
    }

    /// Stored file rows in Merkle order.
    pub async fn files(&self, id: PackageId) -> Result<Vec<PackageFileRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, PackageFileRecord>(
            "SELECT path, hash, size_bytes, merkle_index FROM audit_export_files
             WHERE package_id = ? ORDER BY merkle_index",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?)
    }
}
