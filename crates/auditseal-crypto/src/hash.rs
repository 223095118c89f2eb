//! SHA-256 digests as validated hex value objects.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::CryptoError;

/// A SHA-256 digest, rendered as exactly 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha256Hash([u8; 32]);

impl Sha256Hash {
    /// Parse a hex digest. Uppercase, short or non-hex input is rejected.
    pub fn parse(value: &str) -> Result<Self, CryptoError> {
        let well_formed = value.len() == 64
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(CryptoError::InvalidHash {
                value: value.to_string(),
            });
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(value, &mut bytes).map_err(|_| CryptoError::InvalidHash {
            value: value.to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Hash({}...)", &self.to_hex()[..12])
    }
}

impl FromStr for Sha256Hash {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Sha256Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// SHA-256 of a byte slice.
pub fn hash_bytes(data: &[u8]) -> Sha256Hash {
    Sha256Hash(Sha256::digest(data).into())
}

/// SHA-256 of the UTF-8 bytes of a string.
pub fn hash_str(data: &str) -> Sha256Hash {
    hash_bytes(data.as_bytes())
}

/// Hashing and Merkle aggregation seam.
pub trait HashProvider: Send + Sync {
    /// Digest a buffer.
    fn hash_buffer(&self, data: &[u8]) -> Sha256Hash;

    /// Digest a string.
    fn hash_string(&self, data: &str) -> Sha256Hash {
        self.hash_buffer(data.as_bytes())
    }

    /// Root over an ordered, non-empty list of leaf digests.
    fn build_merkle_root(&self, hashes: &[Sha256Hash]) -> Result<Sha256Hash, CryptoError>;
}

/// SHA-256 implementation of [`HashProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl HashProvider for Sha256Hasher {
    fn hash_buffer(&self, data: &[u8]) -> Sha256Hash {
        hash_bytes(data)
    }

    fn build_merkle_root(&self, hashes: &[Sha256Hash]) -> Result<Sha256Hash, CryptoError> {
        crate::merkle::build_merkle_root(hashes)
    }
}
