//! Stored timestamp value object and the basic check applied on verification.

use auditseal_crypto::Sha256Hash;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimestampError;
use crate::response::contains_subslice;

/// Accepted difference between the TSA clock and ours, in seconds.
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 5 * 60;

/// A TSA-issued timestamp as persisted with a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rfc3161Timestamp {
    /// Base64 of the full `TimeStampResp` DER.
    pub token: String,
    /// TSA-asserted `genTime`.
    pub timestamp: DateTime<Utc>,
    /// Issuing authority name.
    pub authority: String,
}

impl Rfc3161Timestamp {
    pub fn new(
        token: impl Into<String>,
        timestamp: DateTime<Utc>,
        authority: impl Into<String>,
    ) -> Result<Self, TimestampError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(TimestampError::InvalidToken("token is empty".into()));
        }
        Ok(Self {
            token,
            timestamp,
            authority: authority.into(),
        })
    }

    /// Build from raw response bytes.
    pub fn from_der(
        der: &[u8],
        timestamp: DateTime<Utc>,
        authority: impl Into<String>,
    ) -> Result<Self, TimestampError> {
        Self::new(STANDARD.encode(der), timestamp, authority)
    }

    /// Decoded token bytes, as written to a `.tsr` file.
    pub fn token_bytes(&self) -> Result<Vec<u8>, TimestampError> {
        STANDARD
            .decode(self.token.trim())
            .map_err(|e| TimestampError::InvalidToken(e.to_string()))
    }
}

/// Outcome of [`verify_basic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicTimestampCheck {
    /// The digest bytes occur inside the token.
    pub hash_present: bool,
    /// The claimed time is not ahead of now beyond the skew tolerance.
    pub not_in_future: bool,
    /// Informational: the claimed time is more than a year old.
    pub older_than_one_year: bool,
}

impl BasicTimestampCheck {
    pub fn is_valid(&self) -> bool {
        self.hash_present && self.not_in_future
    }

    /// Human-readable summary.
    pub fn describe(&self, timestamp: &Rfc3161Timestamp) -> String {
        let mut parts = vec![format!(
            "issued by {} at {}",
            timestamp.authority,
            timestamp.timestamp.to_rfc3339()
        )];
        if !self.hash_present {
            parts.push("manifest hash not found in token".into());
        }
        if !self.not_in_future {
            parts.push("claimed time is in the future".into());
        }
        if self.older_than_one_year {
            parts.push("timestamp is older than one year".into());
        }
        parts.join("; ")
    }
}

/// Best-effort check of a stored timestamp against `hash`, as of `now`.
///
/// Does not validate the TSA signature or certificate chain.
pub fn verify_basic(
    timestamp: &Rfc3161Timestamp,
    hash: &Sha256Hash,
    now: DateTime<Utc>,
) -> BasicTimestampCheck {
    let hash_present = timestamp
        .token_bytes()
        .map(|bytes| contains_subslice(&bytes, hash.as_bytes()))
        .unwrap_or(false);

    BasicTimestampCheck {
        hash_present,
        not_in_future: timestamp.timestamp <= now + Duration::seconds(CLOCK_SKEW_TOLERANCE_SECS),
        older_than_one_year: timestamp.timestamp < now - Duration::days(365),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditseal_crypto::hash_str;

    fn stamp(der: &[u8], at: DateTime<Utc>) -> Rfc3161Timestamp {
        Rfc3161Timestamp::from_der(der, at, "Test TSA").unwrap()
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(Rfc3161Timestamp::new("", Utc::now(), "x").is_err());
    }

    #[test]
    fn test_hash_present_and_current() {
        let hash = hash_str("m");
        let mut der = vec![0x30, 0x22, 0x04, 0x20];
        der.extend_from_slice(hash.as_bytes());
        let now = Utc::now();
        let check = verify_basic(&stamp(&der, now), &hash, now);
        assert!(check.is_valid());
        assert!(!check.older_than_one_year);
    }

    #[test]
    fn test_missing_hash_fails() {
        let now = Utc::now();
        let check = verify_basic(&stamp(&[1, 2, 3], now), &hash_str("m"), now);
        assert!(!check.hash_present);
        assert!(!check.is_valid());
    }

    #[test]
    fn test_future_time_fails_beyond_skew() {
        let hash = hash_str("m");
        let now = Utc::now();
        let within = verify_basic(&stamp(hash.as_bytes(), now + Duration::minutes(2)), &hash, now);
        assert!(within.not_in_future);
        let beyond = verify_basic(&stamp(hash.as_bytes(), now + Duration::hours(1)), &hash, now);
        assert!(!beyond.not_in_future);
    }

    #[test]
    fn test_old_timestamp_only_flagged() {
        let hash = hash_str("m");
        let now = Utc::now();
        let check = verify_basic(&stamp(hash.as_bytes(), now - Duration::days(800)), &hash, now);
        assert!(check.older_than_one_year);
        assert!(check.is_valid());
    }

    #[test]
    fn test_undecodable_token_fails_softly() {
        let ts = Rfc3161Timestamp::new("%%%", Utc::now(), "x").unwrap();
        assert!(!verify_basic(&ts, &hash_str("m"), Utc::now()).hash_present);
    }
}
