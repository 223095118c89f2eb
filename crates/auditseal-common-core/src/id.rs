//! Strongly-typed identifiers.
//!
//! Identifiers render as bare UUIDs because they appear verbatim in storage
//! keys and archived manifests.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse from the hyphenated UUID form.
            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| IdParseError::InvalidFormat {
                        kind: stringify!($name),
                        value: s.to_string(),
                    })
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

/// Error parsing an ID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// The ID is not a UUID.
    #[error("invalid {kind}: {value:?}")]
    InvalidFormat {
        /// Identifier type being parsed.
        kind: &'static str,
        /// Rejected input.
        value: String,
    },
}

define_id!(OrganizationId, "Tenant that owns exports, keys and packages.");
define_id!(ExportId, "A previously produced data export.");
define_id!(PackageId, "One hardening attempt for an export.");
define_id!(SigningKeyId, "A versioned signing key row.");
define_id!(VerificationLogId, "A persisted verification record.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_bare_uuid() {
        let id = OrganizationId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
        assert_eq!(id.to_string().len(), 36);
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = PackageId::new();
        let parsed: PackageId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = ExportId::parse("not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("ExportId"));
    }

    #[test]
    fn test_serde_transparent() {
        let id = SigningKeyId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: SigningKeyId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
