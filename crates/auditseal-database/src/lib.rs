//! SQLite persistence for AuditSeal.
//!
//! Tables: `audit_configs`, `audit_export_packages`, `audit_export_files`,
//! `signing_keys` and `verification_logs`. Nothing here deletes rows.

pub mod error;
pub mod migration;
pub mod models;
pub mod pool;
pub mod repo;
pub mod schema;

pub use error::DatabaseError;
pub use models::*;
pub use pool::{DatabasePool, PoolConfig, PoolError};
pub use repo::*;

use tracing::info;

/// A migrated database and its repositories.
pub struct Database {
    pool: DatabasePool,
}

impl Database {
    /// Open the pool and apply pending migrations.
    pub async fn connect(config: PoolConfig) -> Result<Self, DatabaseError> {
        let pool = DatabasePool::new(config).await?;
        let mut runner = migration::MigrationRunner::new(pool.pool().clone());
        runner.add_migrations(schema::migrations());
        let applied = runner.run().await?;
        if !applied.is_empty() {
            info!(count = applied.len(), "applied schema migrations");
        }
        Ok(Self { pool })
    }

    /// Fresh private in-memory database.
    pub async fn in_memory() -> Result<Self, DatabaseError> {
        Self::connect(PoolConfig::in_memory()).await
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub fn configs(&self) -> AuditConfigRepository {
        AuditConfigRepository::new(self.pool.pool().clone())
    }

    pub fn packages(&self) -> PackageRepository {
        PackageRepository::new(self.pool.pool().clone())
    }

    pub fn signing_keys(&self) -> SigningKeyRepository {
        SigningKeyRepository::new(self.pool.pool().clone())
    }

    pub fn verification_logs(&self) -> VerificationLogRepository {
        VerificationLogRepository::new(self.pool.pool().clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
