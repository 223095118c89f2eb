//! Command implementations.

pub mod inspect;
pub mod verify;

pub use inspect::{InspectCommand, PackageSummary};
pub use verify::{verify_archive, OfflineCheck, OfflineReport, VerifyCommand};
