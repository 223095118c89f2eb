//! Export hardening and package verification.
//!
//! [`HardeningOrchestrator::harden_export`] turns an export archive into a
//! signed, timestamped package in WORM storage.
//! [`VerificationService::verify_package`] later re-derives every proof from
//! what was persisted. [`AuditSystem`] wires both from configuration.

pub mod error;
pub mod orchestrator;
pub mod package;
pub mod system;
pub mod targets;
pub mod verification;

pub use error::PackageError;
pub use orchestrator::{HardenRequest, HardenedExport, HardeningOrchestrator, HardeningSettings};
pub use package::{assemble_package, PackageContents, SignatureDocument, SignedAuditPackage};
pub use system::{AuditSystem, Collaborators};
pub use targets::ConfigTargetResolver;
pub use verification::{
    VerificationCheck, VerificationResult, VerificationService, AUDIT_PACK_REQUIRED_FILES,
    CHECK_AUDIT_PACK, CHECK_FILE_HASHES, CHECK_MERKLE_ROOT, CHECK_OBJECT_LOCK, CHECK_SIGNATURE,
    CHECK_TIMESTAMP, CHECK_VERIFICATION,
};
