//! Persistence errors.

use auditseal_common_core::AuditError;
use thiserror::Error;

use crate::migration::MigrationError;
use crate::models::PackageStatus;
use crate::pool::PoolError;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("invalid package status transition {from} -> {to}")]
    InvalidTransition { from: PackageStatus, to: PackageStatus },

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("invalid stored value in {column}: {message}")]
    Decode { column: &'static str, message: String },
}

impl DatabaseError {
    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Unique-constraint violations become [`DatabaseError::Conflict`].
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(format!("{what}: {}", db.message()))
            }
            _ => Self::Query(err),
        }
    }
}

impl From<DatabaseError> for AuditError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { resource, id } => AuditError::not_found(resource, id),
            DatabaseError::InvalidTransition { .. } => {
                AuditError::validation("status", err.to_string())
            }
            DatabaseError::Conflict(_) => AuditError::validation("conflict", err.to_string()),
            other => AuditError::internal(other.to_string()),
        }
    }
}
