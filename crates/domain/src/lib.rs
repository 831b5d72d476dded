//! # Sealgate Domain
//!
//! Domain types for the Sealgate interceptor.
//!
//! This crate contains:
//! - Request/response values and the logical key that correlates them
//! - Cache, queue, and key-material records
//! - The interceptor error taxonomy and `Result` alias
//! - Configuration structures and constants
//!
//! ## Architecture
//! - Depends only on `sealgate-common` foundation utilities
//! - No I/O, no async

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
