//! In-memory port implementations for tests.
//!
//! Enabled for unit tests and, through the `test-utils` feature, for
//! downstream integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sealgate_domain::{Request, Response, TransportFailure};

use crate::ports::{
    DurableStore, ReachabilityProbe, Sleeper, StoreError, StoreResult, Transport, TransportError,
};

/// `HashMap`-backed [`DurableStore`] with a real compare-and-set.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Backend`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Write a raw value, bypassing the failure switch.
    pub fn insert_raw(&self, key: &str, value: &[u8]) {
        self.data.lock().insert(key.to_string(), value.to_vec());
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().get(key).cloned()
    }

    /// Keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> =
            self.data.lock().keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check()?;
        self.data.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> StoreResult<bool> {
        self.check()?;
        let mut data = self.data.lock();
        if data.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        data.insert(key.to_string(), new.to_vec());
        Ok(true)
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.check()?;
        self.data.lock().remove(key);
        Ok(())
    }
}

type Responder = Box<dyn Fn(&Request) -> Result<Response, TransportError> + Send + Sync>;

/// [`Transport`] that replays a FIFO script and records every request.
///
/// When the script runs out, the fallback responder answers; without one,
/// calls fail as `Unreachable`.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Response, TransportError>>>,
    fallback: Option<Responder>,
    sent: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every unscripted call with `responder`.
    pub fn with_fallback<F>(responder: F) -> Self
    where
        F: Fn(&Request) -> Result<Response, TransportError> + Send + Sync + 'static,
    {
        Self { fallback: Some(Box::new(responder)), ..Self::default() }
    }

    pub fn push_response(&self, response: Response) {
        self.script.lock().push_back(Ok(response));
    }

    pub fn push_error(&self, kind: TransportFailure, message: &str) {
        self.script.lock().push_back(Err(TransportError::new(kind, message)));
    }

    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("scripted", &self.script.lock().len())
            .field("sent", &self.sent.lock().len())
            .finish()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        self.sent.lock().push(request.clone());
        let scripted = self.script.lock().pop_front();
        match (scripted, &self.fallback) {
            (Some(result), _) => result,
            (None, Some(responder)) => responder(request),
            (None, None) => {
                Err(TransportError::new(TransportFailure::Unreachable, "script exhausted"))
            }
        }
    }
}

/// [`ReachabilityProbe`] flipped by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualProbe {
    reachable: Arc<AtomicBool>,
}

impl ManualProbe {
    pub fn new(reachable: bool) -> Self {
        Self { reachable: Arc::new(AtomicBool::new(reachable)) }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReachabilityProbe for ManualProbe {
    async fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

/// [`Sleeper`] that records requested delays and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `MemoryStore::compare_and_set` behavior for the first
    /// writer wins scenario.
    ///
    /// Assertions:
    /// - Only the first absent-slot CAS succeeds.
    /// - A CAS with the current value as `expected` succeeds.
    #[tokio::test]
    async fn test_compare_and_set_semantics() {
        let store = MemoryStore::new();
        assert!(store.compare_and_set("k", None, b"a").await.unwrap());
        assert!(!store.compare_and_set("k", None, b"b").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"a".to_vec()));

        assert!(store.compare_and_set("k", Some(b"a"), b"c").await.unwrap());
        assert_eq!(store.raw("k"), Some(b"c".to_vec()));
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(store.put("k", b"v").await.is_err());
        store.set_failing(false);
        assert!(store.put("k", b"v").await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_transport_order() {
        let transport = ScriptedTransport::new();
        transport.push_response(Response::new(503));
        transport.push_response(Response::new(200));
        let request = Request::get("https://example.com/a").build().unwrap();

        assert_eq!(transport.send(&request).await.unwrap().status(), 503);
        assert_eq!(transport.send(&request).await.unwrap().status(), 200);
        assert!(transport.send(&request).await.is_err());
        assert_eq!(transport.sent_count(), 3);
    }
}
