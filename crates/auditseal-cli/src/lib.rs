//! AuditSeal CLI library.
//!
//! Offline verification and inspection of package archives produced by the
//! hardening pipeline.

pub mod cli;
pub mod commands;
pub mod output;

use std::process::ExitCode;

pub use cli::{Cli, Command};
pub use commands::{verify_archive, OfflineCheck, OfflineReport, PackageSummary};

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Exit {
    /// Command succeeded; for `verify`, every check passed.
    Valid = 0,
    /// At least one check failed.
    Invalid = 1,
    /// The package could not be read at all.
    Error = 2,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}
