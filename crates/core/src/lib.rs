//! # Sealgate Core
//!
//! Interceptor logic with no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for the transport, durable store, reachability probe,
//!   and backoff clock
//! - The payload codec and persisted key
//! - Response cache, pending request queue, and retry policy
//! - The per-call pipeline and the replay coordinator
//!
//! ## Architecture Principles
//! - Only depends on `sealgate-common` and `sealgate-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod cache;
pub mod connectivity;
pub mod crypto;
pub mod merge;
pub mod pipeline;
pub mod ports;
pub mod queue;
pub mod replay;
pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::ResponseCache;
pub use connectivity::ConnectivityMonitor;
pub use crypto::{CryptoCodec, KeyVault};
pub use pipeline::{InterceptorPipeline, InterceptorPipelineBuilder};
pub use ports::{
    DurableStore, ReachabilityProbe, Sleeper, StoreError, StoreResult, TokioSleeper, Transport,
    TransportError,
};
pub use queue::PendingRequestQueue;
pub use replay::ReplayCoordinator;
pub use retry::{RetryDecision, RetryPolicy};
