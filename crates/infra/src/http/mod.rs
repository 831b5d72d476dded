//! HTTP adapters: the outbound transport and the reachability probe.

pub mod probe;
pub mod transport;

pub use probe::HttpReachabilityProbe;
pub use transport::{ReqwestTransport, ReqwestTransportBuilder};
