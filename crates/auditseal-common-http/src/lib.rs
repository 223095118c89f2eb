//! HTTP client utilities for AuditSeal.
//!
//! Used for binary exchanges with the Time-Stamp Authority and for
//! downloading packages through presigned URLs.

pub mod client;

pub use client::{build_client, HttpClient, HttpConfig, HttpError};
