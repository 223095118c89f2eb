//! Configuration for AuditSeal.
//!
//! Settings are read from `auditseal.yaml` (or `AUDITSEAL_CONFIG_PATH`),
//! with `${VAR}` and `${VAR:-default}` placeholders expanded from the
//! environment and `.env` files.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
