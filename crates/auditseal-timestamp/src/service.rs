//! Manifest-level timestamping.

use auditseal_crypto::Sha256Hash;
use std::sync::Arc;
use tracing::info;

use crate::error::TimestampError;
use crate::provider::TimestampProvider;
use crate::token::{BasicTimestampCheck, Rfc3161Timestamp};

/// Requests and checks timestamps over manifest hashes.
#[derive(Clone)]
pub struct TimestampService {
    provider: Arc<dyn TimestampProvider>,
}

impl TimestampService {
    pub fn new(provider: Arc<dyn TimestampProvider>) -> Self {
        Self { provider }
    }

    /// Timestamp a manifest hash.
    pub async fn timestamp_manifest(
        &self,
        manifest_hash: &Sha256Hash,
    ) -> Result<Rfc3161Timestamp, TimestampError> {
        let stamp = self.provider.timestamp(manifest_hash).await?;
        info!(
            manifest_hash = %manifest_hash,
            authority = %stamp.authority,
            timestamp = %stamp.timestamp,
            "manifest timestamped"
        );
        Ok(stamp)
    }

    /// Basic check of a stored timestamp for a manifest hash.
    pub fn verify_timestamp(
        &self,
        timestamp: &Rfc3161Timestamp,
        manifest_hash: &Sha256Hash,
    ) -> BasicTimestampCheck {
        let check = self.provider.verify_basic(timestamp, manifest_hash);
        if check.older_than_one_year {
            tracing::warn!(timestamp = %timestamp.timestamp, "timestamp is older than one year");
        }
        check
    }
}
