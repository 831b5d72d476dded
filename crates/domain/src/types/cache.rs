use chrono::{DateTime, Utc};
use sealgate_common::base64_bytes;
use serde::{Deserialize, Serialize};

use super::http::LogicalKey;

/// Last successful GET payload for a logical key.
///
/// Overwritten by the next successful GET for the same key; never expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: LogicalKey,
    pub status_code: u16,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(key: LogicalKey, status_code: u16, payload: Vec<u8>) -> Self {
        Self { key, status_code, payload, stored_at: Utc::now() }
    }

    /// Payload parsed as a JSON value, if it is one.
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}
