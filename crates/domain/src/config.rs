//! Configuration structures
//!
//! Every section has serde defaults so partial files are accepted. Durations
//! are carried as milliseconds (`*_ms` keys).

use std::path::PathBuf;
use std::time::Duration;

use sealgate_common::duration_millis;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE, DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_PROBE_INTERVAL_MS, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_REPLAY_MAX_ATTEMPTS,
    DEFAULT_REPLAY_SWEEP_INTERVAL_MS, DEFAULT_RETRY_BACKOFF_MS,
};
use crate::errors::{InterceptError, Result};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealgateConfig {
    pub transport: TransportConfig,
    pub retry: RetryConfig,
    pub replay: ReplayConfig,
    pub connectivity: ConnectivityConfig,
    pub storage: StorageConfig,
    pub encryption: EncryptionConfig,
    pub pipeline: PipelineConfig,
}

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    #[serde(rename = "timeout_ms", with = "duration_millis")]
    pub timeout: Duration,
    pub user_agent: String,
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Constant delay between attempts.
    #[serde(rename = "backoff_ms", with = "duration_millis")]
    pub backoff: Duration,
}

/// Replay coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Replays allowed per queued request before it is dropped.
    pub max_attempts: u32,
    #[serde(rename = "sweep_interval_ms", with = "duration_millis")]
    pub sweep_interval: Duration,
}

/// Connectivity probing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// URL probed with `HEAD`; without one, state only changes via `report`.
    pub probe_url: Option<String>,
    #[serde(rename = "poll_interval_ms", with = "duration_millis")]
    pub poll_interval: Duration,
    #[serde(rename = "probe_timeout_ms", with = "duration_millis")]
    pub probe_timeout: Duration,
}

/// Durable store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub pool_size: u32,
}

/// Payload encryption configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub enabled: bool,
}

/// Pipeline behaviour configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// PUTs without an explicit chain merge from the GET of the same path.
    pub auto_chain_writes: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            user_agent: format!("sealgate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_REPLAY_MAX_ATTEMPTS,
            sweep_interval: Duration::from_millis(DEFAULT_REPLAY_SWEEP_INTERVAL_MS),
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: None,
            poll_interval: Duration::from_millis(DEFAULT_PROBE_INTERVAL_MS),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: PathBuf::from(DEFAULT_DB_PATH), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { auto_chain_writes: true }
    }
}

impl SealgateConfig {
    /// Reject values the runtime cannot operate with.
    ///
    /// # Errors
    /// Returns `InterceptError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.storage.pool_size == 0 {
            return Err(InterceptError::Config("storage.pool_size must be at least 1".into()));
        }
        if self.replay.max_attempts == 0 {
            return Err(InterceptError::Config("replay.max_attempts must be at least 1".into()));
        }
        if self.replay.sweep_interval.is_zero() {
            return Err(InterceptError::Config("replay.sweep_interval_ms must be non-zero".into()));
        }
        if self.connectivity.poll_interval.is_zero() {
            return Err(InterceptError::Config(
                "connectivity.poll_interval_ms must be non-zero".into(),
            ));
        }
        if let Some(probe_url) = &self.connectivity.probe_url {
            Url::parse(probe_url).map_err(|e| {
                InterceptError::Config(format!("connectivity.probe_url is not absolute: {e}"))
            })?;
        }
        Ok(())
    }
}
