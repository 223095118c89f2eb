//! Immutable (WORM) storage for audit packages.
//!
//! [`ObjectStorage`] is the S3-compatible boundary. [`WormStorageAdapter`]
//! uploads packages unconditionally and adds Object Lock retention only where
//! the bucket supports it.

pub mod client;
pub mod error;
pub mod fetch;
pub mod memory;
pub mod worm;

pub use client::{ObjectHead, ObjectLockConfiguration, ObjectRetention, ObjectStorage};
pub use error::StorageError;
pub use fetch::{HttpObjectFetcher, MemoryObjectFetcher, ObjectFetcher};
pub use memory::MemoryObjectStorage;
pub use worm::{
    FixedStorageTarget, LockStatus, StorageTarget, StorageTargetResolver, UploadOutcome,
    WormStorageAdapter, ZIP_CONTENT_TYPE,
};

/// Object key of a package: `{prefix}/{org}/{YYYY-MM-DD}/{package}.zip`.
pub fn package_key(
    prefix: &str,
    organization_id: auditseal_common_core::OrganizationId,
    date: chrono::NaiveDate,
    package_id: auditseal_common_core::PackageId,
) -> String {
    format!(
        "{}/{}/{}/{}.zip",
        prefix.trim_end_matches('/'),
        organization_id,
        date.format("%Y-%m-%d"),
        package_id
    )
}
