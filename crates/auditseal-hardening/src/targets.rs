//! Storage targets from organization audit configuration.

use async_trait::async_trait;
use auditseal_common_core::{LockMode, OrganizationId, RetentionYears};
use auditseal_database::AuditConfigRepository;
use auditseal_storage::{StorageError, StorageTarget, StorageTargetResolver};

/// Bucket and lock mode from `audit_configs`, falling back to the defaults
/// for organizations without a row.
pub struct ConfigTargetResolver {
    configs: AuditConfigRepository,
    default_bucket: String,
    default_years: RetentionYears,
    default_mode: LockMode,
}

impl ConfigTargetResolver {
    pub fn new(
        configs: AuditConfigRepository,
        default_bucket: impl Into<String>,
        default_years: RetentionYears,
        default_mode: LockMode,
    ) -> Self {
        Self {
            configs,
            default_bucket: default_bucket.into(),
            default_years,
            default_mode,
        }
    }
}

#[async_trait]
impl StorageTargetResolver for ConfigTargetResolver {
    async fn resolve(
        &self,
        organization_id: OrganizationId,
    ) -> Result<StorageTarget, StorageError> {
        let config = self
            .configs
            .get_or_create(organization_id, self.default_years, self.default_mode)
            .await
            .map_err(|e| StorageError::Service(format!("audit configuration unavailable: {e}")))?;
        Ok(StorageTarget {
            bucket: config
                .bucket
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| self.default_bucket.clone()),
            lock_mode: config.lock_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditseal_database::Database;

    #[tokio::test]
    async fn test_defaults_then_override() {
        let db = Database::in_memory().await.unwrap();
        let resolver = ConfigTargetResolver::new(
            db.configs(),
            "audit-default",
            RetentionYears::DEFAULT,
            LockMode::Governance,
        );
        let org = OrganizationId::new();

        let target = resolver.resolve(org).await.unwrap();
        assert_eq!(target.bucket, "audit-default");
        assert_eq!(target.lock_mode, LockMode::Governance);

        db.configs()
            .upsert(org, RetentionYears::new(5).unwrap(), LockMode::Compliance, Some("eu-audit"))
            .await
            .unwrap();
        let target = resolver.resolve(org).await.unwrap();
        assert_eq!(target.bucket, "eu-audit");
        assert_eq!(target.lock_mode, LockMode::Compliance);
    }
}
