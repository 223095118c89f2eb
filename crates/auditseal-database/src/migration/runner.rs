use super::types::*;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub struct MigrationRunner {
    pool: SqlitePool,
    migrations: BTreeMap<i64, Migration>,
}

impl MigrationRunner {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            migrations: BTreeMap::new(),
        }
    }

    pub fn add_migration(&mut self, migration: Migration) {
        self.migrations.insert(migration.version, migration);
    }

    pub fn add_migrations(&mut self, migrations: Vec<Migration>) {
        for migration in migrations {
            self.add_migration(migration);
        }
    }

    /// Initialize the migration tracking table
    pub async fn init(&self) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _auditseal_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                checksum TEXT NOT NULL,
                applied_at DATETIME NOT NULL,
                execution_time_ms INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Highest applied migration
    pub async fn current_version(&self) -> Result<Option<i64>, MigrationError> {
        self.init().await?;

        let row = sqlx::query("SELECT MAX(version) AS version FROM _auditseal_migrations")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get::<Option<i64>, _>("version")?)
    }

    pub async fn get_applied(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        self.init().await?;

        let applied = sqlx::query_as::<_, AppliedMigration>(
            "SELECT version, name, checksum, applied_at, execution_time_ms
             FROM _auditseal_migrations
             ORDER BY version",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(applied)
    }

    pub async fn pending(&self) -> Result<Vec<Migration>, MigrationError> {
        let current = self.current_version().await?.unwrap_or(0);
        Ok(self
            .migrations
            .range(current + 1..)
            .map(|(_, m)| m.clone())
            .collect())
    }

    /// Verify checksums of applied migrations, then apply pending ones.
    pub async fn run(&self) -> Result<Vec<MigrationResult>, MigrationError> {
        let mismatches = self.verify().await?;
        if !mismatches.is_empty() {
            return Err(MigrationError::ChecksumMismatch(mismatches.join("; ")));
        }

        let pending = self.pending().await?;
        let mut results = Vec::with_capacity(pending.len());

        for migration in pending {
            let start = std::time::Instant::now();
            info!("Applying migration: {} - {}", migration.version, migration.name);

            let mut tx = self.pool.begin().await?;
            sqlx::query(&migration.up_sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    MigrationError::ExecutionFailed(format!(
                        "Failed to apply migration {}: {}",
                        migration.version, e
                    ))
                })?;

            let elapsed = start.elapsed().as_millis() as i64;
            sqlx::query(
                "INSERT INTO _auditseal_migrations
                 (version, name, checksum, applied_at, execution_time_ms)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(migration.version)
            .bind(&migration.name)
            .bind(&migration.checksum)
            .bind(Utc::now())
            .bind(elapsed)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            results.push(MigrationResult {
                version: migration.version,
                name: migration.name,
                execution_time_ms: elapsed,
            });
        }

        debug!(applied = results.len(), "migrations complete");
        Ok(results)
    }

    /// Verify migration checksums
    pub async fn verify(&self) -> Result<Vec<String>, MigrationError> {
        let applied = self.get_applied().await?;
        let mut mismatches = Vec::new();

        for applied_migration in applied {
            match self.migrations.get(&applied_migration.version) {
                Some(known) if known.checksum != applied_migration.checksum => {
                    mismatches.push(format!(
                        "Migration {} checksum mismatch: expected {}, found {}",
                        applied_migration.version, known.checksum, applied_migration.checksum
                    ));
                }
                Some(_) => {}
                None => mismatches.push(format!(
                    "Migration {} is applied but unknown to this build",
                    applied_migration.version
                )),
            }
        }

        Ok(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> SqlitePool {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migration_runner_init() {
        let runner = MigrationRunner::new(setup_pool().await);
        runner.init().await.unwrap();
        assert_eq!(runner.current_version().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_migration_execution_is_idempotent() {
        let mut runner = MigrationRunner::new(setup_pool().await);
        runner.add_migration(Migration::new(
            1,
            "test_migration",
            "CREATE TABLE test_table (id INTEGER PRIMARY KEY)",
        ));

        let results = runner.run().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(runner.current_version().await.unwrap(), Some(1));
        assert!(runner.run().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changed_migration_is_detected() {
        let pool = setup_pool().await;
        let mut runner = MigrationRunner::new(pool.clone());
        runner.add_migration(Migration::new(1, "t", "CREATE TABLE t (id INTEGER)"));
        runner.run().await.unwrap();

        let mut edited = MigrationRunner::new(pool);
        edited.add_migration(Migration::new(1, "t", "CREATE TABLE t (id TEXT)"));
        assert!(matches!(
            edited.run().await.unwrap_err(),
            MigrationError::ChecksumMismatch(_)
        ));
    }
}
