//! RFC 3161 trusted timestamping.
//!
//! A `TimeStampReq` is DER-encoded with `der`, POSTed to a Time-Stamp Authority,
//! and the reply is checked for a granted status. The token's `genTime` is
//! located by scanning for the first well-formed GeneralizedTime; TSA
//! certificate chains are not validated. A reply whose time cannot be decoded
//! is an error, never replaced by the local clock.

pub mod asn1;
pub mod error;
pub mod provider;
pub mod request;
pub mod response;
pub mod service;
pub mod token;
pub mod transport;

pub use error::TimestampError;
pub use provider::{Rfc3161Provider, RetryPolicy, TimestampProvider};
pub use request::TimeStampRequest;
pub use response::{parse_response, PkiStatus, TimeStampResponse};
pub use service::TimestampService;
pub use token::{verify_basic, BasicTimestampCheck, Rfc3161Timestamp};
pub use transport::{HttpTsaTransport, TsaTransport};
