//! Domain types and models

pub mod cache;
pub mod call;
pub mod connectivity;
pub mod http;
pub mod outcome;
pub mod queue;
pub mod secret;

pub use cache::CachedEntry;
pub use call::CallState;
pub use connectivity::{ConnectivityState, SubscriptionId};
pub use http::{HttpMethod, LogicalKey, Request, RequestBuilder, Response};
pub use outcome::{ReplayOutcome, ReplayReport, ReplayResult, RetryNotice, SubmitOutcome};
pub use queue::QueuedRequest;
pub use secret::SecretKeyMaterial;
