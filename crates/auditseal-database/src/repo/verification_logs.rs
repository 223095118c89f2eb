use auditseal_common_core::{OrganizationId, PackageId, VerificationLogId};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DatabaseError;
use crate::models::{VerificationLogRecord, VerificationRequester};

/// Input for one verification log row.
#[derive(Debug, Clone)]
pub struct NewVerificationLog {
    pub package_id: PackageId,
    pub organization_id: OrganizationId,
    pub is_valid: bool,
    pub checks_performed: Vec<String>,
    pub checks_passed: Vec<String>,
    pub checks_failed: Vec<String>,
    pub error_details: serde_json::Value,
    pub requester: VerificationRequester,
    pub verified_at: DateTime<Utc>,
}

/// Append-only `verification_logs` access.
#[derive(Clone)]
pub struct VerificationLogRepository {
    pool: SqlitePool,
}

impl VerificationLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        log: &NewVerificationLog,
    ) -> Result<VerificationLogId, DatabaseError> {
        let id = VerificationLogId::new();
        sqlx::query(
            "INSERT INTO verification_logs
             (id, package_id, organization_id, is_valid, checks_performed, checks_passed,
              checks_failed, error_details, actor_id, source, ip_address, user_agent, verified_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(log.package_id.to_string())
        .bind(log.organization_id.to_string())
        .bind(log.is_valid)
        .bind(encode(&log.checks_performed)?)
        .bind(encode(&log.checks_passed)?)
        .bind(encode(&log.checks_failed)?)
        .bind(encode(&log.error_details)?)
        .bind(&log.requester.actor_id)
        .bind(&log.requester.source)
        .bind(&log.requester.ip_address)
        .bind(&log.requester.user_agent)
        .bind(log.verified_at)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Newest first.
    pub async fn for_package(
        &self,
        package_id: PackageId,
    ) -> Result<Vec<VerificationLogRecord>, DatabaseError> {
        Ok(sqlx::query_as::<_, VerificationLogRecord>(
            "SELECT * FROM verification_logs WHERE package_id = ? ORDER BY verified_at DESC",
        )
        .bind(package_id.to_string())
        .fetch_all(&self.pool)
        .await?)
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Decode {
        column: "verification_logs",
        message: e.to_string(),
    })
}
