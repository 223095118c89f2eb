use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Failed to create connection pool: {0}")]
    Creation(#[from] sqlx::Error),

    #[error("Pool health check failed: {0}")]
    HealthCheck(String),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Path to SQLite database file, or `:memory:`
    pub database_path: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// `None` keeps idle connections open forever
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    pub wal_mode: bool,
    /// Busy timeout for locked database
    pub busy_timeout: Duration,
    pub create_if_missing: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            database_path: "auditseal.db".to_string(),
            min_connections: 1,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            wal_mode: true,
            busy_timeout: Duration::from_secs(5),
            create_if_missing: true,
        }
    }
}

impl PoolConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    /// A private in-memory database. It lives exactly as long as its single
    /// connection, so that connection is never recycled.
    pub fn in_memory() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            idle_timeout: None,
            max_lifetime: None,
            wal_mode: false,
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.min_connections > self.max_connections {
            return Err(PoolError::InvalidConfig(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(PoolError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Database connection pool wrapper
pub struct DatabasePool {
    pool: SqlitePool,
    config: PoolConfig,
}

impl DatabasePool {
    #[instrument(skip(config), fields(path = %config.database_path))]
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let connect_options = Self::build_connect_options(&config)?;

        let pool = SqlitePoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect_with(connect_options)
            .await?;

        info!("Database pool created with {} max connections", config.max_connections);

        let db_pool = Self { pool, config };
        db_pool.health_check().await?;

        Ok(db_pool)
    }

    fn build_connect_options(config: &PoolConfig) -> Result<SqliteConnectOptions, PoolError> {
        let url = format!("sqlite:{}", config.database_path);
        let mut options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| PoolError::InvalidConfig(e.to_string()))?
            .create_if_missing(config.create_if_missing)
            .busy_timeout(config.busy_timeout)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Full);

        if config.wal_mode {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        Ok(options)
    }

    /// Get a reference to the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), PoolError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PoolError::HealthCheck(e.to_string()))?;

        Ok(())
    }

    /// Close the pool gracefully
    #[instrument(skip(self))]
    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
