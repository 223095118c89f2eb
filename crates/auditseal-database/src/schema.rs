//! Schema migrations, one statement each.

use crate::migration::Migration;

pub fn migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "create_audit_configs",
            r#"
            CREATE TABLE audit_configs (
                organization_id TEXT PRIMARY KEY,
                retention_years INTEGER NOT NULL CHECK (retention_years BETWEEN 1 AND 10),
                lock_mode TEXT NOT NULL CHECK (lock_mode IN ('governance', 'compliance')),
                bucket TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        ),
        Migration::new(
            2,
            "create_signing_keys",
            r#"
            CREATE TABLE signing_keys (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                public_key TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                version INTEGER NOT NULL CHECK (version >= 1),
                is_active BOOLEAN NOT NULL,
                created_at DATETIME NOT NULL,
                rotated_at DATETIME,
                UNIQUE (organization_id, version)
            )
            "#,
        ),
        Migration::new(
            3,
            "one_active_signing_key",
            "CREATE UNIQUE INDEX idx_signing_keys_one_active
             ON signing_keys (organization_id) WHERE is_active = 1",
        ),
        Migration::new(
            4,
            "create_audit_export_packages",
            r#"
            CREATE TABLE audit_export_packages (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                export_id TEXT NOT NULL,
                export_type TEXT NOT NULL CHECK (export_type IN ('data', 'payroll', 'audit_pack')),
                status TEXT NOT NULL,
                error_message TEXT,
                manifest_json TEXT,
                manifest_hash TEXT,
                merkle_root TEXT,
                file_count INTEGER,
                total_size_bytes INTEGER,
                signature_value TEXT,
                signature_public_key TEXT,
                signing_key_id TEXT REFERENCES signing_keys (id),
                signing_key_version INTEGER,
                signed_at DATETIME,
                timestamp_token TEXT,
                timestamp_at DATETIME,
                timestamp_authority TEXT,
                s3_bucket TEXT,
                s3_key TEXT,
                retention_years INTEGER NOT NULL CHECK (retention_years BETWEEN 1 AND 10),
                retention_until DATETIME,
                object_lock_enabled BOOLEAN NOT NULL DEFAULT 0,
                lock_mode TEXT,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                completed_at DATETIME
            )
            "#,
        ),
        Migration::new(
            5,
            "index_packages_by_export",
            "CREATE INDEX idx_packages_org_export
             ON audit_export_packages (organization_id, export_id)",
        ),
        Migration::new(
            6,
            "create_audit_export_files",
            r#"
            CREATE TABLE audit_export_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_id TEXT NOT NULL REFERENCES audit_export_packages (id),
                path TEXT NOT NULL,
                hash TEXT NOT NULL,
                size_bytes INTEGER NOT NULL CHECK (size_bytes >= 0),
                merkle_index INTEGER NOT NULL CHECK (merkle_index >= 0),
                UNIQUE (package_id, path),
                UNIQUE (package_id, merkle_index)
            )
            "#,
        ),
        Migration::new(
            7,
            "create_verification_logs",
            r#"
            CREATE TABLE verification_logs (
                id TEXT PRIMARY KEY,
                package_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                is_valid BOOLEAN NOT NULL,
                checks_performed TEXT NOT NULL,
                checks_passed TEXT NOT NULL,
                checks_failed TEXT NOT NULL,
                error_details TEXT NOT NULL,
                actor_id TEXT,
                source TEXT,
                ip_address TEXT,
                user_agent TEXT,
                verified_at DATETIME NOT NULL
            )
            "#,
        ),
        Migration::new(
            8,
            "index_verification_logs_by_package",
            "CREATE INDEX idx_verification_logs_package
             ON verification_logs (package_id, verified_at)",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_dense_and_ordered() {
        let versions: Vec<_> = migrations().iter().map(|m| m.version).collect();
        let expected: Vec<i64> = (1..=versions.len() as i64).collect();
        assert_eq!(versions, expected);
    }
}
