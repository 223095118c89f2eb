//! Error taxonomy for AuditSeal operations.
//!
//! Each crate owns a narrow error enum; all of them convert into
//! [`AuditError`], which is what the pipeline and verification entry points
//! surface to callers.

use thiserror::Error;

/// Taxonomy bucket of an [`AuditError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller supplied an out-of-range or empty value.
    Validation,
    /// A package, config or key does not exist.
    NotFound,
    /// Malformed hash, signature or key material.
    Crypto,
    /// Recomputed proof material disagrees with stored material.
    Integrity,
    /// A TSA, object store or secret store call failed.
    ExternalService,
    /// Anything else, including an unreachable database.
    Internal,
}

/// The main error type for AuditSeal operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// Input validation failed.
    #[error("validation failed for {field}: {message}")]
    Validation {
        /// Offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// A resource does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource type.
        resource: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// Cryptographic material could not be used.
    #[error("crypto error during {operation}: {message}")]
    Crypto {
        /// Operation being performed.
        operation: String,
        /// Failure detail.
        message: String,
    },

    /// Stored and recomputed values differ.
    #[error("integrity violation on {subject}: expected {expected}, got {actual}")]
    Integrity {
        /// What was being compared.
        subject: String,
        /// Stored value.
        expected: String,
        /// Recomputed value.
        actual: String,
    },

    /// An external collaborator failed.
    #[error("{service} failed during {operation}: {message}")]
    ExternalService {
        /// Collaborator name.
        service: String,
        /// Operation attempted.
        operation: String,
        /// Failure detail.
        message: String,
    },

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// Failure detail.
        message: String,
    },
}

impl AuditError {
    /// Create a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// Create a crypto error.
    pub fn crypto(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Crypto {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an integrity error.
    pub fn integrity(
        subject: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Integrity {
            subject: subject.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an external service error.
    pub fn external(
        service: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ExternalService {
            service: service.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Crypto { .. } => ErrorKind::Crypto,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::ExternalService { .. } => ErrorKind::ExternalService,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

impl ErrorKind {
    /// Stable lowercase name, used in persisted verification details.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Crypto => "crypto",
            Self::Integrity => "integrity",
            Self::ExternalService => "external_service",
            Self::Internal => "internal",
        }
    }
}

/// Result type alias using [`AuditError`].
pub type Result<T> = std::result::Result<T, AuditError>;
