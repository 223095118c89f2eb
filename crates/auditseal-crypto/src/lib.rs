//! Cryptographic building blocks for audit packages.
//!
//! - [`hash`]: SHA-256 value object and digest helpers.
//! - [`merkle`]: Merkle roots and inclusion proofs over raw digest bytes.
//! - [`signing`]: Ed25519 keys in PKCS#8/SPKI PEM form, signing and verification.

pub mod error;
pub mod hash;
pub mod merkle;
pub mod signing;

pub use error::CryptoError;
pub use hash::{hash_bytes, hash_str, HashProvider, Sha256Hash, Sha256Hasher};
pub use merkle::{
    build_merkle_root, hash_pair, verify_merkle_proof, MerkleProof, MerkleTree, ProofStep,
    SiblingPosition,
};
pub use signing::{
    public_key_pem_to_base64, signing_message, Ed25519Signature, Ed25519Signer, GeneratedKeyPair,
    SigningProvider,
};
