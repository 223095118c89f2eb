//! Organization signing keys.
//!
//! [`KeyManager`] owns key custody: private keys live only in the external
//! secret store, public keys and their version history in the database.
//! [`SigningService`] signs manifest digests with the active key and verifies
//! them against whichever version produced them.

pub mod manager;
pub mod signing;

pub use manager::{signing_key_secret_path, KeyManager, SIGNING_KEY_SECRET_PATH};
pub use signing::{ManifestSignature, SigningService};
