//! Common utility functions
//!
//! - **[`serde`]**: serialization helpers for durations and byte payloads

pub mod serde;

pub use self::serde::{base64_bytes, duration_millis};
