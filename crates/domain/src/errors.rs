//! Error types used throughout the interceptor

use std::time::Duration;

use sealgate_common::error::{ErrorClassification, ErrorSeverity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::impl_label_conversions;

/// Why a payload could not be encrypted or decrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptoErrorKind {
    /// Input is not a well-formed sealed payload for the configured mode.
    BadCiphertext,
    /// Authentication failed: the payload was sealed under another key or
    /// was tampered with.
    KeyMismatch,
    /// Key material is missing, corrupt, or the wrong length.
    InvalidKey,
}

impl_label_conversions!(CryptoErrorKind {
    BadCiphertext => "bad_ciphertext",
    KeyMismatch => "key_mismatch",
    InvalidKey => "invalid_key",
});

/// Crypto failure with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CryptoError {
    pub kind: CryptoErrorKind,
    pub message: String,
}

impl CryptoError {
    pub fn new(kind: CryptoErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Transport-level failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailure {
    /// The upstream could not be reached at all (DNS, refused, no route).
    Unreachable,
    Timeout,
    Other,
}

impl_label_conversions!(TransportFailure {
    Unreachable => "unreachable",
    Timeout => "timeout",
    Other => "other",
});

/// Main error type for the interceptor
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum InterceptError {
    #[error("upstream returned {status} after {attempts} attempts")]
    TransientUpstream { status: u16, attempts: u32 },

    #[error("upstream rejected the request with status {status}")]
    PermanentUpstream { status: u16 },

    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    #[error("transport error ({kind}): {message}")]
    Transport { kind: TransportFailure, message: String },

    #[error("replay abandoned after {attempts} attempts: {last_error}")]
    QueueExhausted { attempts: u32, last_error: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("malformed data: {0}")]
    MalformedData(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for interceptor operations
pub type Result<T> = std::result::Result<T, InterceptError>;

/// Flat, caller-facing error label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TransientUpstream,
    PermanentUpstream,
    Crypto,
    Transport,
    QueueExhausted,
    Storage,
    MalformedData,
    InvalidRequest,
    Config,
    Internal,
}

impl_label_conversions!(ErrorKind {
    TransientUpstream => "transient_upstream",
    PermanentUpstream => "permanent_upstream",
    Crypto => "crypto",
    Transport => "transport",
    QueueExhausted => "queue_exhausted",
    Storage => "storage",
    MalformedData => "malformed_data",
    InvalidRequest => "invalid_request",
    Config => "config",
    Internal => "internal",
});

impl InterceptError {
    pub fn crypto(kind: CryptoErrorKind, message: impl Into<String>) -> Self {
        Self::Crypto(CryptoError::new(kind, message))
    }

    pub fn transport(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self::Transport { kind, message: message.into() }
    }

    /// Flat label for this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientUpstream { .. } => ErrorKind::TransientUpstream,
            Self::PermanentUpstream { .. } => ErrorKind::PermanentUpstream,
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::QueueExhausted { .. } => ErrorKind::QueueExhausted,
            Self::Storage(_) => ErrorKind::Storage,
            Self::MalformedData(_) => ErrorKind::MalformedData,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the upstream could not be reached at all.
    ///
    /// The replay drain treats this as lost connectivity rather than a
    /// failure of the queued request.
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport { kind: TransportFailure::Unreachable, .. })
    }
}

impl From<CryptoError> for InterceptError {
    fn from(err: CryptoError) -> Self {
        Self::Crypto(err)
    }
}

impl From<serde_json::Error> for InterceptError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedData(err.to_string())
    }
}

impl ErrorClassification for InterceptError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::TransientUpstream { .. } => true,
            Self::Transport { kind, .. } => {
                matches!(kind, TransportFailure::Unreachable | TransportFailure::Timeout)
            }
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TransientUpstream { .. } | Self::Transport { .. } => ErrorSeverity::Warning,
            Self::PermanentUpstream { .. } | Self::InvalidRequest(_) => ErrorSeverity::Error,
            Self::QueueExhausted { .. } | Self::Config(_) | Self::Storage(_) => {
                ErrorSeverity::Error
            }
            Self::MalformedData(_) => ErrorSeverity::Warning,
            Self::Crypto(_) | Self::Internal(_) => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Crypto(_) | Self::Internal(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
