//! Audit manifests.
//!
//! A manifest lists every file of an export with its SHA-256 and position in
//! the Merkle tree. Files are always taken in path order so any party holding
//! the archive can rebuild the same root.

pub mod archive;
pub mod builder;
pub mod error;
pub mod types;

pub use archive::{ArchiveEntry, ArchiveReader};
pub use builder::{BuiltManifest, ManifestBuilder, ManifestVerification};
pub use error::ManifestError;
pub use types::{format_instant, AuditFileEntry, AuditManifest, ExportType, MANIFEST_VERSION};
