//! `TimeStampResp` decoding.
//!
//! The envelope and `PKIStatusInfo` are decoded with `der`. `genTime` is
//! taken from the first well-formed GeneralizedTime inside the token;
//! `TSTInfo` precedes the certificate set in `SignedData`, so that is the
//! TSA's time.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use der::{Decode, Encode};

use crate::asn1::TimeStampResp;
use crate::error::TimestampError;

/// GeneralizedTime universal tag.
const TAG_GENERALIZED_TIME: u8 = 0x18;

/// `PKIStatus` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkiStatus {
    Granted,
    GrantedWithMods,
    Rejection,
    Waiting,
    RevocationWarning,
    RevocationNotification,
    Unknown(i64),
}

impl PkiStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Granted,
            1 => Self::GrantedWithMods,
            2 => Self::Rejection,
            3 => Self::Waiting,
            4 => Self::RevocationWarning,
            5 => Self::RevocationNotification,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Granted => 0,
            Self::GrantedWithMods => 1,
            Self::Rejection => 2,
            Self::Waiting => 3,
            Self::RevocationWarning => 4,
            Self::RevocationNotification => 5,
            Self::Unknown(code) => *code,
        }
    }

    /// Whether a token was issued.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted | Self::GrantedWithMods)
    }
}

/// A granted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStampResponse {
    pub status: PkiStatus,
    /// The `TimeStampToken` element, header included.
    pub token: Vec<u8>,
    /// TSA-asserted time.
    pub gen_time: DateTime<Utc>,
    /// The complete response as received.
    pub raw: Vec<u8>,
}

impl TimeStampResponse {
    /// Whether the token embeds the given digest bytes.
    pub fn contains_imprint(&self, digest: &[u8]) -> bool {
        contains_subslice(&self.token, digest)
    }
}

pub(crate) fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Decode a `TimeStampResp`, failing on any status other than granted.
pub fn parse_response(bytes: &[u8]) -> Result<TimeStampResponse, TimestampError> {
    let response = TimeStampResp::from_der(bytes)?;
    let status = PkiStatus::from_code(response.status.status);
    if !status.is_granted() {
        return Err(TimestampError::Rejected {
            status: status.code(),
            text: response.status.status_string.map(|lines| lines.join("; ")),
        });
    }

    let token = response
        .time_stamp_token
        .ok_or(TimestampError::MissingToken)?
        .to_der()?;
    let gen_time = find_generalized_time(&token).ok_or(TimestampError::MissingGenTime)?;

    Ok(TimeStampResponse {
        status,
        token,
        gen_time,
        raw: bytes.to_vec(),
    })
}

/// First GeneralizedTime (`YYYYMMDDHHMMSS[.f+]Z`) found anywhere in `bytes`.
pub fn find_generalized_time(bytes: &[u8]) -> Option<DateTime<Utc>> {
    bytes.iter().enumerate().find_map(|(i, tag)| {
        if *tag != TAG_GENERALIZED_TIME {
            return None;
        }
        let len = usize::from(*bytes.get(i + 1)?);
        if !(15..=32).contains(&len) {
            return None;
        }
        parse_generalized_time(bytes.get(i + 2..i + 2 + len)?)
    })
}

/// Decode GeneralizedTime content octets in UTC form.
pub fn parse_generalized_time(content: &[u8]) -> Option<DateTime<Utc>> {
    let text = std::str::from_utf8(content).ok()?;
    let body = text.strip_suffix('Z')?;
    let (whole, fraction) = match body.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (body, None),
    };
    if whole.len() != 14 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = |range: std::ops::Range<usize>| whole[range].parse::<u32>().ok();
    let year = i32::try_from(field(0..4)?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?;

    let nanos = match fraction {
        Some(f) if !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()) => {
            let digits: String = f.chars().take(9).collect();
            let scale = 10u32.pow(9 - digits.len() as u32);
            digits.parse::<u32>().ok()? * scale
        }
        Some(_) => return None,
        None => 0,
    };

    let time = date.and_hms_nano_opt(field(8..10)?, field(10..12)?, field(12..14)?, nanos)?;
    Some(Utc.from_utc_datetime(&time))
}
