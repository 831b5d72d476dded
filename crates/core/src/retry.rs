//! Retry decisions for a single logical call.
//!
//! Pure: the policy sees only the attempt index and the outcome, never the
//! request.

use std::ops::RangeInclusive;
use std::time::Duration;

use sealgate_domain::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF_MS, RETRYABLE_STATUS_MAX, RETRYABLE_STATUS_MIN,
};
use sealgate_domain::RetryConfig;

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Stop,
    RetryAfter(Duration),
}

impl RetryDecision {
    pub const fn is_retry(&self) -> bool {
        matches!(self, Self::RetryAfter(_))
    }
}

/// Bounded retry with a constant delay over the 5xx band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
    retryable: RangeInclusive<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS))
    }
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, backoff: Duration) -> Self {
        Self { max_retries, backoff, retryable: RETRYABLE_STATUS_MIN..=RETRYABLE_STATUS_MAX }
    }

    pub const fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.backoff)
    }

    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub const fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable.contains(&status)
    }

    /// Decide after attempt `attempt` (zero-based) answered with `status`.
    pub fn decide(&self, attempt: u32, status: u16) -> RetryDecision {
        if attempt < self.max_retries && self.is_retryable_status(status) {
            RetryDecision::RetryAfter(self.backoff)
        } else {
            RetryDecision::Stop
        }
    }

    /// Decide after attempt `attempt` failed before any status arrived.
    pub const fn decide_transport_failure(&self, attempt: u32) -> RetryDecision {
        if attempt < self.max_retries {
            RetryDecision::RetryAfter(self.backoff)
        } else {
            RetryDecision::Stop
        }
    }
}
