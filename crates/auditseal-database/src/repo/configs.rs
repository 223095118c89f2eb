use auditseal_common_core::{LockMode, OrganizationId, RetentionYears};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DatabaseError;
use crate::models::AuditConfigRecord;

/// `audit_configs` access.
#[derive(Clone)]
pub struct AuditConfigRepository {
    pool: SqlitePool,
}

impl AuditConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<AuditConfigRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, AuditConfigRecord>(
            "SELECT * FROM audit_configs WHERE organization_id = ?",
        )
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Existing configuration, or a new row with the given defaults.
    pub async fn get_or_create(
        &self,
        organization_id: OrganizationId,
        default_years: RetentionYears,
        default_mode: LockMode,
    ) -> Result<AuditConfigRecord, DatabaseError> {
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO audit_configs
             (organization_id, retention_years, lock_mode, bucket, created_at, updated_at)
             VALUES (?, ?, ?, NULL, ?, ?)",
        )
        .bind(organization_id.to_string())
        .bind(default_years.get() as i64)
        .bind(default_mode.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() > 0 {
            info!(
                %organization_id,
                years = default_years.get(),
                mode = %default_mode,
                "created audit config"
            );
        }

        self.get(organization_id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("audit_config", organization_id))
    }

    /// Create or replace an organization's settings.
    pub async fn upsert(
        &self,
        organization_id: OrganizationId,
        retention_years: RetentionYears,
        lock_mode: LockMode,
        bucket: Option<&str>,
    ) -> Result<AuditConfigRecord, DatabaseError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO audit_configs
             (organization_id, retention_years, lock_mode, bucket, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (organization_id) DO UPDATE SET
                retention_years = excluded.retention_years,
                lock_mode = excluded.lock_mode,
                bucket = excluded.bucket,
                updated_at = excluded.updated_at",
        )
        .bind(organization_id.to_string())
        .bind(retention_years.get() as i64)
        .bind(lock_mode.as_str())
        .bind(bucket)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get(organization_id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("audit_config", organization_id))
    }
}
