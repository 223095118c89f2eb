//! Configuration types.

use auditseal_common_core::LockMode;
use auditseal_common_log::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSealConfig {
    /// Time-Stamp Authority settings.
    pub tsa: TsaConfig,
    /// Object storage settings.
    pub storage: StorageConfig,
    /// Relational store settings.
    pub database: DatabaseConfig,
    /// Defaults applied to organizations without an audit configuration.
    pub retention: RetentionConfig,
    /// Logging settings.
    pub logging: LogConfig,
}

/// RFC 3161 Time-Stamp Authority settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsaConfig {
    /// Endpoint receiving `application/timestamp-query` POSTs.
    pub url: String,
    /// Authority name recorded with each timestamp.
    pub authority: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay unit for linear backoff (`attempt * base`).
    pub retry_base_delay_ms: u64,
}

impl Default for TsaConfig {
    fn default() -> Self {
        Self {
            url: "https://freetsa.org/tsr".to_string(),
            authority: "FreeTSA".to_string(),
            timeout_secs: 15,
            max_attempts: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl TsaConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff unit.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Object storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Default bucket for audit packages.
    pub bucket: String,
    /// Key prefix under which packages are written.
    pub key_prefix: String,
    /// Lifetime of presigned download URLs in seconds.
    pub presign_ttl_secs: u64,
    /// How long a bucket's Object Lock capability is cached.
    pub lock_cache_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "auditseal-packages".to_string(),
            key_prefix: "audit-exports".to_string(),
            presign_ttl_secs: 24 * 60 * 60,
            lock_cache_ttl_secs: 60 * 60,
        }
    }
}

impl StorageConfig {
    /// Presigned URL lifetime.
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }

    /// Lock capability cache lifetime.
    pub fn lock_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_cache_ttl_secs)
    }
}

/// SQLite settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Maximum pooled connections.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("auditseal.db"),
            max_connections: 10,
        }
    }
}

/// Retention defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Years applied when an organization has no configuration row.
    pub default_years: u32,
    /// Lock mode applied when an organization has no configuration row.
    pub default_lock_mode: LockMode,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            default_years: 10,
            default_lock_mode: LockMode::Governance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuditSealConfig::default();
        assert_eq!(config.tsa.timeout(), Duration::from_secs(15));
        assert_eq!(config.tsa.max_attempts, 3);
        assert_eq!(config.storage.presign_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.storage.key_prefix, "audit-exports");
        assert_eq!(config.retention.default_years, 10);
        assert_eq!(config.retention.default_lock_mode, LockMode::Governance);
    }

    #[test]
    fn test_partial_yaml_merges_with_defaults() {
        let yaml = r#"
tsa:
  url: https://tsa.example.test/tsr
retention:
  default_lock_mode: compliance
"#;
        let config: AuditSealConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tsa.url, "https://tsa.example.test/tsr");
        assert_eq!(config.tsa.timeout_secs, 15);
        assert_eq!(config.retention.default_lock_mode, LockMode::Compliance);
        assert_eq!(config.storage.bucket, "auditseal-packages");
    }

    #[test]
    fn test_config_serializes_to_yaml() {
        let yaml = serde_yaml::to_string(&AuditSealConfig::default()).unwrap();
        assert!(yaml.contains("tsa:"));
        assert!(yaml.contains("default_lock_mode: governance"));
    }
}
