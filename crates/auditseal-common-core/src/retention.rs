//! Retention policy value types.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuditError;

/// Number of years an audit package must be retained, in `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RetentionYears(u32);

impl RetentionYears {
    /// Smallest accepted value.
    pub const MIN: u32 = 1;
    /// Largest accepted value.
    pub const MAX: u32 = 10;
    /// Applied when an organization has no audit configuration yet.
    pub const DEFAULT: RetentionYears = RetentionYears(10);

    /// Validate and wrap a year count.
    pub fn new(years: u32) -> Result<Self, AuditError> {
        if (Self::MIN..=Self::MAX).contains(&years) {
            Ok(Self(years))
        } else {
            Err(AuditError::validation(
                "retention_years",
                format!(
                    "must be between {} and {}, got {}",
                    Self::MIN,
                    Self::MAX,
                    years
                ),
            ))
        }
    }

    /// Raw year count.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// `from + years`, in calendar years. Feb 29 clamps to Feb 28.
    pub fn add_to(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from.checked_add_months(Months::new(self.0 * 12))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for RetentionYears {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for RetentionYears {
    type Error = AuditError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RetentionYears> for u32 {
    fn from(value: RetentionYears) -> Self {
        value.0
    }
}

impl fmt::Display for RetentionYears {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object Lock retention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Privileged users may shorten or remove retention.
    #[default]
    Governance,
    /// Nobody, including the root account, can shorten retention.
    Compliance,
}

impl LockMode {
    /// S3 wire value.
    pub fn as_s3_str(&self) -> &'static str {
        match self {
            Self::Governance => "GOVERNANCE",
            Self::Compliance => "COMPLIANCE",
        }
    }

    /// Lowercase value used in configuration and persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Governance => "governance",
            Self::Compliance => "compliance",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockMode {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "governance" => Ok(Self::Governance),
            "compliance" => Ok(Self::Compliance),
            other => Err(AuditError::validation(
                "lock_mode",
                format!("unknown lock mode {other:?}"),
            )),
        }
    }
}
