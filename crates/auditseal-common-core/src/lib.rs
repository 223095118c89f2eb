//! AuditSeal common core types.
//!
//! Identifiers, the error taxonomy shared by every pipeline crate, and the
//! retention policy value types.

pub mod error;
pub mod id;
pub mod retention;

pub use error::{AuditError, ErrorKind, Result};
pub use id::{ExportId, IdParseError, OrganizationId, PackageId, SigningKeyId, VerificationLogId};
pub use retention::{LockMode, RetentionYears};
