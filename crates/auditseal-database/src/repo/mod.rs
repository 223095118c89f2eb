pub mod configs;
pub mod keys;
pub mod packages;
pub mod verification_logs;

pub use configs::AuditConfigRepository;
pub use keys::SigningKeyRepository;
pub use packages::PackageRepository;
pub use verification_logs::{NewVerificationLog, VerificationLogRepository};
