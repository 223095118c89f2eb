//! Timestamping errors.

use auditseal_common_core::AuditError;
use auditseal_common_http::HttpError;
use thiserror::Error;

/// Errors from requesting or decoding RFC 3161 timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("TSA request failed: {0}")]
    Transport(String),

    #[error("TSA request timed out")]
    Timeout,

    #[error("malformed TSA response: {0}")]
    Malformed(String),

    #[error("TSA rejected the request with status {status}{}", status_text(text))]
    Rejected { status: i64, text: Option<String> },

    #[error("TSA response carries no timestamp token")]
    MissingToken,

    #[error("no decodable genTime in timestamp token")]
    MissingGenTime,

    #[error("timestamp token does not contain the requested message imprint")]
    ImprintMismatch,

    #[error("invalid stored timestamp: {0}")]
    InvalidToken(String),
}

impl From<der::Error> for TimestampError {
    fn from(err: der::Error) -> Self {
        TimestampError::Malformed(err.to_string())
    }
}

fn status_text(text: &Option<String>) -> String {
    text.as_ref().map(|t| format!(": {t}")).unwrap_or_default()
}

impl From<HttpError> for TimestampError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout => TimestampError::Timeout,
            other => TimestampError::Transport(other.to_string()),
        }
    }
}

impl From<TimestampError> for AuditError {
    fn from(err: TimestampError) -> Self {
        match err {
            TimestampError::InvalidToken(_) => {
                AuditError::crypto("decode_timestamp", err.to_string())
            }
            other => AuditError::external("tsa", "timestamp", other.to_string()),
        }
    }
}
