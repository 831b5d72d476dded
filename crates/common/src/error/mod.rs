//! Common error types and classification shared by every Sealgate crate.
//!
//! The error handling system is built on three pieces:
//!
//! 1. **`CommonError`**: error patterns that recur across crates (timeouts,
//!    serialization, storage, configuration).
//! 2. **`ErrorClassification`**: a standard interface for asking whether an
//!    error is retryable, how severe it is, and whether it is critical.
//! 3. **`ErrorSeverity`**: a unified severity scale used when logging.
//!
//! Crate-specific errors compose with `CommonError` rather than duplicating
//! it:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum StoreError {
//!     #[error("row decode failed: {0}")]
//!     Decode(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//!
//! impl_error_classification!(StoreError, Common,
//!     Self::Decode(_) => { retryable: false, severity: ErrorSeverity::Error, critical: false },
//! );
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard result type using `CommonError`.
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple crates.
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String, field: Option<String> },

    /// Serialization or deserialization errors
    #[error("Serialization error ({}): {message}", .format.as_deref().unwrap_or("unknown"))]
    Serialization { message: String, format: Option<String> },

    /// Storage/database errors
    #[error("Storage error: {message}")]
    Storage { message: String, operation: Option<String> },

    /// Timeout errors
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// Cryptographic failures surfaced outside the cipher module
    #[error("Crypto error: {message}")]
    Crypto { message: String },

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {message}")]
    Internal { message: String, context: Option<String> },
}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error for a specific field
    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a serialization error tagged with its format
    pub fn serialization_format<F: Into<String>, S: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a storage error for a named operation
    pub fn storage<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Storage { message: message.into(), operation: Some(operation.into()) }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a crypto error
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto { message: message.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), context: None }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } => ErrorSeverity::Error,
            Self::Serialization { .. } => ErrorSeverity::Error,
            Self::Storage { .. } => ErrorSeverity::Error,
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Crypto { .. } => ErrorSeverity::Critical,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. } | Self::Crypto { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again, such as timeouts or a temporarily unavailable upstream.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    ///
    /// Critical errors typically indicate data corruption, key problems, or
    /// internal invariant violations.
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::storage("io", err.to_string())
    }
}

/// Macro to implement `ErrorClassification` by delegating to `CommonError`
///
/// The first argument is the error type, the second the variant that wraps a
/// `CommonError`. Remaining arms classify the crate-specific variants.
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_retryable(),
                    $(
                        $variant => $retryable,
                    )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => e.severity(),
                    $(
                        $variant => $severity,
                    )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_critical(),
                    $(
                        $variant => $critical,
                    )*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => e.retry_after(),
                    _ => None,
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    //! Unit tests for the common error taxonomy.

    use super::*;

    #[derive(Debug, Error)]
    enum WidgetError {
        #[error("bad widget: {0}")]
        Bad(String),

        #[error(transparent)]
        Common(#[from] CommonError),
    }

    impl_error_classification!(WidgetError, Common,
        Self::Bad(_) => { retryable: false, severity: ErrorSeverity::Info, critical: false },
    );

    /// Validates `CommonError::timeout` behavior for the retryable
    /// classification scenario.
    ///
    /// Assertions:
    /// - Timeouts are retryable at warning severity.
    /// - Storage errors are not retryable.
    #[test]
    fn test_timeout_is_retryable() {
        let err = CommonError::timeout("probe", Duration::from_secs(3));
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let storage = CommonError::storage("put", "disk full");
        assert!(!storage.is_retryable());
        assert!(storage.to_string().contains("disk full"));
    }

    /// Validates `impl_error_classification!` behavior for the delegating
    /// variant scenario.
    ///
    /// Assertions:
    /// - The wrapped `CommonError` classification is forwarded.
    /// - Local arms use their declared values.
    #[test]
    fn test_macro_delegates_to_common_variant() {
        let wrapped = WidgetError::from(CommonError::crypto("tag mismatch"));
        assert!(wrapped.is_critical());
        assert_eq!(wrapped.severity(), ErrorSeverity::Critical);

        let local = WidgetError::Bad("x".into());
        assert!(!local.is_retryable());
        assert_eq!(local.severity(), ErrorSeverity::Info);
        assert!(local.retry_after().is_none());
    }

    /// Validates `From<serde_json::Error>` behavior for the JSON failure
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the error is a `Serialization` variant tagged `JSON`.
    #[test]
    fn test_serde_json_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = CommonError::from(parse);
        match err {
            CommonError::Serialization { format, .. } => {
                assert_eq!(format.as_deref(), Some("JSON"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
    }
}
