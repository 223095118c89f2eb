//! Manifest errors.

use auditseal_common_core::AuditError;
use auditseal_crypto::CryptoError;
use thiserror::Error;

/// Errors from reading archives and building manifests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("archive is not a readable zip: {0}")]
    Archive(String),

    #[error("archive contains no files")]
    EmptyArchive,

    #[error("failed to read archive entry {path}: {message}")]
    Entry { path: String, message: String },

    #[error("manifest entry has an empty path")]
    EmptyPath,

    #[error("duplicate manifest path {0}")]
    DuplicatePath(String),

    #[error("manifest JSON: {0}")]
    Json(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl From<zip::result::ZipError> for ManifestError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

impl From<serde_json::Error> for ManifestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<ManifestError> for AuditError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Crypto(inner) => inner.into(),
            ManifestError::EmptyArchive => AuditError::validation("archive", err.to_string()),
            ManifestError::Archive(_) | ManifestError::Entry { .. } => {
                AuditError::validation("archive", err.to_string())
            }
            ManifestError::EmptyPath | ManifestError::DuplicatePath(_) => {
                AuditError::validation("files", err.to_string())
            }
            ManifestError::Json(_) => AuditError::internal(err.to_string()),
        }
    }
}
