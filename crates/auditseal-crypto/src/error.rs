//! Crypto errors.

use auditseal_common_core::AuditError;
use thiserror::Error;

/// Errors from hashing, Merkle and signing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid SHA-256 hash {value:?}: expected 64 lowercase hex characters")]
    InvalidHash { value: String },

    #[error("cannot build a Merkle root from zero hashes")]
    EmptyMerkleInput,

    #[error("failed to encode key: {0}")]
    KeyEncoding(String),

    #[error("failed to decode key: {0}")]
    KeyDecoding(String),

    #[error("invalid signature material: {0}")]
    InvalidSignature(String),
}

impl From<CryptoError> for AuditError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::EmptyMerkleInput => AuditError::validation("files", err.to_string()),
            CryptoError::InvalidHash { .. } => AuditError::crypto("parse_hash", err.to_string()),
            CryptoError::KeyEncoding(_) => AuditError::crypto("encode_key", err.to_string()),
            CryptoError::KeyDecoding(_) => AuditError::crypto("decode_key", err.to_string()),
            CryptoError::InvalidSignature(_) => AuditError::crypto("sign", err.to_string()),
        }
    }
}
