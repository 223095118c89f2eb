//! Storage errors.

use auditseal_common_core::AuditError;
use auditseal_common_http::HttpError;
use thiserror::Error;

/// Object storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("bucket not found: {0}")]
    NoSuchBucket(String),

    #[error("object not found: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    #[error("object lock configuration not found for bucket {0}")]
    NoObjectLockConfiguration(String),

    #[error("no retention set on {bucket}/{key}")]
    NoRetention { bucket: String, key: String },

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("invalid presigned URL {0}")]
    InvalidUrl(String),

    #[error("storage service error: {0}")]
    Service(String),

    #[error("network error: {0}")]
    Network(String),
}

impl StorageError {
    /// "Not found"-class errors: the thing asked about does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoSuchBucket(_)
                | Self::NoSuchKey { .. }
                | Self::NoObjectLockConfiguration(_)
                | Self::NoRetention { .. }
        )
    }
}

impl From<HttpError> for StorageError {
    fn from(err: HttpError) -> Self {
        if err.is_not_found() {
            Self::Service(format!("presigned object not found: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<StorageError> for AuditError {
    fn from(err: StorageError) -> Self {
        AuditError::external("object-storage", "storage", err.to_string())
    }
}
