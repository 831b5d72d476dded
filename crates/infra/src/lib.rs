//! # Sealgate Infrastructure
//!
//! Adapters for the ports defined in `sealgate-core`.
//!
//! This crate contains:
//! - The SQLite durable store (r2d2 pooled, WAL mode)
//! - The reqwest transport and `HEAD` reachability probe
//! - Configuration loading (environment, `.env`, TOML/JSON files)
//! - [`SealgateRuntime`], which wires everything together
//!
//! ## Architecture
//! - Implements traits defined in `sealgate-core`
//! - Contains all "impure" code (disk, network, environment)

pub mod config;
pub mod database;
mod errors;
pub mod http;
pub mod runtime;

pub use database::{DbManager, SqliteStore};
pub use http::{HttpReachabilityProbe, ReqwestTransport, ReqwestTransportBuilder};
pub use runtime::{SealgateRuntime, SealgateRuntimeBuilder};
pub use sealgate_common::{init_tracing, LogFormat};
