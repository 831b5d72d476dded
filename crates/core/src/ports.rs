//! Port interfaces consumed by the interceptor services
//!
//! Adapters live in `sealgate-infra`; in-memory doubles live in
//! [`crate::testing`].

use std::time::Duration;

use async_trait::async_trait;
use sealgate_common::error::{CommonError, ErrorSeverity};
use sealgate_common::impl_error_classification;
use sealgate_domain::{InterceptError, Request, Response, TransportFailure};
use thiserror::Error;

/// Errors raised by a [`DurableStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl_error_classification!(StoreError, Common,
    Self::Backend(_) => { retryable: false, severity: ErrorSeverity::Error, critical: false },
);

/// Store result type
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for InterceptError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Generic durable key-value store.
///
/// Keys are namespaced by prefix (`cache:`, `queue:`, `secret:`). Each call
/// is individually atomic.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write `value` under `key`, overwriting unconditionally
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Write `new` only if the current value equals `expected`.
    ///
    /// `expected = None` means "only if absent". Returns whether the write
    /// happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> StoreResult<bool>;

    /// Delete `key`; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Failure of a single transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportFailure,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl From<TransportError> for InterceptError {
    fn from(err: TransportError) -> Self {
        Self::Transport { kind: err.kind, message: err.message }
    }
}

/// HTTP client primitive.
///
/// Sends the request exactly as given; no retries, no body rewriting.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

/// Platform reachability signal.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Timed suspension used for retry backoff.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use sealgate_common::error::ErrorClassification;

    use super::*;

    #[test]
    fn test_store_error_maps_to_storage() {
        let err = InterceptError::from(StoreError::Backend("locked".into()));
        assert!(matches!(err, InterceptError::Storage(msg) if msg.contains("locked")));
        assert!(!StoreError::Backend("x".into()).is_retryable());
    }

    #[test]
    fn test_transport_error_keeps_kind() {
        let err = InterceptError::from(TransportError::new(TransportFailure::Unreachable, "dns"));
        assert!(err.is_unreachable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_waits() {
        let started = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(3)).await;
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
