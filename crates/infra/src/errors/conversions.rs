//! Conversions from external infrastructure errors into port errors.

use rusqlite::Error as SqlError;
use sealgate_core::{StoreError, TransportError};
use sealgate_domain::TransportFailure;

/// Map a driver or pool failure onto [`StoreError`].
pub(crate) trait IntoStoreError {
    fn into_store_error(self) -> StoreError;
}

/// Map an HTTP client failure onto [`TransportError`].
pub(crate) trait IntoTransportError {
    fn into_transport_error(self) -> TransportError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StoreError */
/* -------------------------------------------------------------------------- */

impl IntoStoreError for SqlError {
    fn into_store_error(self) -> StoreError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let message = match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => "database is busy".to_string(),
                    ErrorCode::DatabaseLocked => "database is locked".to_string(),
                    ErrorCode::DiskFull => "disk is full".to_string(),
                    ErrorCode::ReadOnly => "database is read-only".to_string(),
                    ErrorCode::CannotOpen => format!("unable to open database: {message}"),
                    ErrorCode::NotADatabase => "file is not a database".to_string(),
                    _ => format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    ),
                }
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                format!("failed to convert sqlite value: {cause}")
            }
            RE::InvalidColumnType(_, _, ty) => format!("invalid column type: {ty}"),
            RE::InvalidPath(path) => format!("invalid database path: {}", path.to_string_lossy()),
            other => other.to_string(),
        };
        StoreError::Backend(message)
    }
}

impl IntoStoreError for r2d2::Error {
    fn into_store_error(self) -> StoreError {
        StoreError::Backend(format!("connection pool: {self}"))
    }
}

pub(crate) fn join_error(err: tokio::task::JoinError) -> StoreError {
    StoreError::Backend(format!("blocking store task failed: {err}"))
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

impl IntoTransportError for reqwest::Error {
    fn into_transport_error(self) -> TransportError {
        if self.is_timeout() {
            return TransportError::new(TransportFailure::Timeout, "HTTP request timed out");
        }

        if self.is_connect() {
            return TransportError::new(
                TransportFailure::Unreachable,
                format!("HTTP connection failure: {self}"),
            );
        }

        TransportError::new(TransportFailure::Other, self.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
