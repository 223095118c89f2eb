//! Package archive errors.

use auditseal_common_core::AuditError;
use auditseal_manifest::ManifestError;
use auditseal_timestamp::TimestampError;
use thiserror::Error;

/// Errors writing or reading a hardened package archive.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to write package archive: {0}")]
    Write(String),

    #[error("package is missing {0}")]
    MissingEntry(&'static str),

    #[error("malformed {entry}: {message}")]
    Malformed { entry: &'static str, message: String },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

impl From<zip::result::ZipError> for PackageError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Write(err.to_string())
    }
}

impl From<std::io::Error> for PackageError {
    fn from(err: std::io::Error) -> Self {
        Self::Write(err.to_string())
    }
}

impl From<PackageError> for AuditError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::Write(message) => AuditError::internal(message),
            PackageError::MissingEntry(_) | PackageError::Malformed { .. } => {
                AuditError::validation("package", err.to_string())
            }
            PackageError::Manifest(inner) => inner.into(),
            PackageError::Timestamp(inner) => inner.into(),
        }
    }
}
