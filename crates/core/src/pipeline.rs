//! Per-call orchestration: merge, encrypt, connectivity gate, send with
//! retry, decrypt, cache write-through.
//!
//! Each call walks the [`CallState`] machine on its own task. Backoff waits
//! suspend only that task. `submit` detaches the call, so a caller that stops
//! waiting does not cancel an attempt already under way.

use std::sync::Arc;

use parking_lot::RwLock;
use sealgate_common::error::ErrorClassification;
use sealgate_domain::constants::{
    CIPHERTEXT_CONTENT_TYPE, CONTENT_TYPE_HEADER, LOGICAL_CONTENT_TYPE_HEADER,
};
use sealgate_domain::{
    CallState, ConnectivityState, HttpMethod, InterceptError, LogicalKey, Request, Response,
    Result, RetryNotice, SubmitOutcome,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::ResponseCache;
use crate::connectivity::ConnectivityMonitor;
use crate::crypto::{CryptoCodec, KeyVault};
use crate::merge;
use crate::ports::{Sleeper, TokioSleeper, Transport};
use crate::queue::PendingRequestQueue;
use crate::retry::{RetryDecision, RetryPolicy};

type RetryListener = Arc<dyn Fn(&RetryNotice) + Send + Sync>;

pub struct InterceptorPipeline {
    transport: Arc<dyn Transport>,
    monitor: Arc<ConnectivityMonitor>,
    cache: Arc<ResponseCache>,
    queue: Arc<PendingRequestQueue>,
    vault: Arc<KeyVault>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    encryption_enabled: bool,
    auto_chain_writes: bool,
    retry_listeners: RwLock<Vec<RetryListener>>,
}

impl std::fmt::Debug for InterceptorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorPipeline")
            .field("policy", &self.policy)
            .field("encryption_enabled", &self.encryption_enabled)
            .field("auto_chain_writes", &self.auto_chain_writes)
            .finish_non_exhaustive()
    }
}

impl InterceptorPipeline {
    pub fn builder() -> InterceptorPipelineBuilder {
        InterceptorPipelineBuilder::default()
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<PendingRequestQueue> {
        &self.queue
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Register a listener called before every backoff wait.
    pub fn on_retry<F>(&self, listener: F)
    where
        F: Fn(&RetryNotice) + Send + Sync + 'static,
    {
        self.retry_listeners.write().push(Arc::new(listener));
    }

    /// Run `request` through the pipeline.
    ///
    /// Never blocks on connectivity: when offline the logical request is
    /// queued and `Deferred` is returned at once.
    pub async fn submit(self: &Arc<Self>, request: Request) -> SubmitOutcome {
        let pipeline = Arc::clone(self);
        match tokio::spawn(async move { pipeline.run(request).await }).await {
            Ok(outcome) => outcome,
            Err(e) => SubmitOutcome::Failed(InterceptError::Internal(format!(
                "call task ended abnormally: {e}"
            ))),
        }
    }

    #[instrument(skip(self, request), fields(request_id = %request.id(), key = %request.logical_key()))]
    async fn run(&self, request: Request) -> SubmitOutcome {
        let mut trace = CallTrace::new(&request);

        let (logical, outbound) = match self.prepare(&request).await {
            Ok(prepared) => prepared,
            Err(e) => return trace.fail(e),
        };

        trace.advance(CallState::AwaitingConnectivity);
        if self.monitor.current_state() == ConnectivityState::Unavailable {
            return match self.queue.enqueue(request).await {
                Ok(entry) => {
                    trace.advance(CallState::Queued);
                    info!(queued_id = %entry.id, "offline; request deferred");
                    SubmitOutcome::Deferred { queued_id: entry.id }
                }
                Err(e) => trace.fail(e),
            };
        }

        match self.deliver(&mut trace, &logical, &outbound).await {
            Ok(response) => SubmitOutcome::Completed(response),
            Err(e) => SubmitOutcome::Failed(e),
        }
    }

    /// Run `request` without the connectivity gate.
    ///
    /// Used for replays: the merge step runs again against the cache as it is
    /// now, and failures are returned instead of queued.
    ///
    /// # Errors
    /// Any failure of the merge, crypto, transport, or upstream stages.
    #[instrument(skip(self, request), fields(request_id = %request.id(), key = %request.logical_key()))]
    pub async fn execute(&self, request: &Request) -> Result<Response> {
        let mut trace = CallTrace::new(request);
        let (logical, outbound) = match self.prepare(request).await {
            Ok(prepared) => prepared,
            Err(e) => {
                trace.advance(CallState::Failed);
                return Err(e);
            }
        };
        self.deliver(&mut trace, &logical, &outbound).await
    }

    /// `Building`: merged logical request plus its sealed wire form.
    async fn prepare(&self, request: &Request) -> Result<(Request, Request)> {
        let logical = self.merge_cached(request).await;
        let outbound = self.seal(&logical).await?;
        Ok((logical, outbound))
    }

    async fn deliver(
        &self,
        trace: &mut CallTrace,
        logical: &Request,
        outbound: &Request,
    ) -> Result<Response> {
        let response = match self.send_with_retry(trace, outbound).await {
            Ok(response) => response,
            Err(e) => {
                trace.advance(CallState::Failed);
                return Err(e);
            }
        };

        trace.advance(CallState::Completed);
        match self.complete(logical, response).await {
            Ok(response) => Ok(response),
            Err(e) => {
                trace.advance(CallState::Failed);
                Err(e)
            }
        }
    }

    fn chain_key(&self, request: &Request) -> Option<LogicalKey> {
        if !request.method().is_write() {
            return None;
        }
        if let Some(key) = request.chain_to() {
            return Some(key.clone());
        }
        (self.auto_chain_writes && request.method() == HttpMethod::Put)
            .then(|| LogicalKey::get_for(request.target()))
    }

    async fn merge_cached(&self, request: &Request) -> Request {
        let Some(chain) = self.chain_key(request) else {
            return request.clone();
        };

        let entry = match self.cache.get(&chain).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(chain = %chain, "no cached entry to merge");
                return request.clone();
            }
            Err(e) => {
                warn!(chain = %chain, error = %e, "cache unavailable; sending without merge");
                return request.clone();
            }
        };

        match merge::merged_body(&entry, request.body(), request.content_type()) {
            Some((body, content_type)) => {
                debug!(chain = %chain, "merged cached fields into write");
                request.with_body(body, content_type)
            }
            None => {
                warn!(chain = %chain, "cached payload or caller body is not mergeable");
                request.clone()
            }
        }
    }

    /// Encrypt the body once; every retry resends this exact request.
    async fn seal(&self, request: &Request) -> Result<Request> {
        if !self.encryption_enabled {
            return Ok(request.clone());
        }
        let Some(body) = request.body().filter(|body| !body.is_empty()) else {
            return Ok(request.clone());
        };

        let key = self.vault.key().await?;
        let sealed = CryptoCodec::encrypt(body, key)?;
        Ok(request
            .with_header(LOGICAL_CONTENT_TYPE_HEADER, request.content_type())
            .with_body(sealed, CIPHERTEXT_CONTENT_TYPE))
    }

    async fn send_with_retry(&self, trace: &mut CallTrace, outbound: &Request) -> Result<Response> {
        let mut attempt: u32 = 0;
        loop {
            trace.advance(CallState::Sending);
            let outcome = self.transport.send(outbound).await;
            trace.advance(CallState::Retrying);

            let decision = match &outcome {
                Ok(response) if response.is_success() => RetryDecision::Stop,
                Ok(response) => self.policy.decide(attempt, response.status()),
                Err(e) if InterceptError::from(e.clone()).is_retryable() => {
                    self.policy.decide_transport_failure(attempt)
                }
                Err(_) => RetryDecision::Stop,
            };

            let RetryDecision::RetryAfter(delay) = decision else {
                return match outcome {
                    Ok(response) if response.is_success() => Ok(response),
                    Ok(response) => Err(self.upstream_error(response.status(), attempt + 1)),
                    Err(e) => Err(e.into()),
                };
            };

            let status = outcome.as_ref().ok().map(Response::status);
            match &outcome {
                Ok(response) => warn!(
                    attempt,
                    status = response.status(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retryable upstream status"
                ),
                Err(e) => warn!(
                    attempt,
                    error = %e,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "transport failure; retrying"
                ),
            }
            self.notify_retry(&RetryNotice {
                request_id: trace.request_id,
                logical_key: trace.key.clone(),
                attempt,
                status,
                delay,
            });
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    fn upstream_error(&self, status: u16, attempts: u32) -> InterceptError {
        if self.policy.is_retryable_status(status) {
            InterceptError::TransientUpstream { status, attempts }
        } else {
            InterceptError::PermanentUpstream { status }
        }
    }

    fn notify_retry(&self, notice: &RetryNotice) {
        let listeners: Vec<RetryListener> = self.retry_listeners.read().clone();
        for listener in listeners {
            listener(notice);
        }
    }

    /// `Completed`: decrypt, then write successful GET payloads through.
    async fn complete(&self, logical: &Request, response: Response) -> Result<Response> {
        let response = self.open(logical, response).await?;

        if logical.method() == HttpMethod::Get {
            self.write_through(logical, &response).await;
        }
        Ok(response)
    }

    /// Decrypt the body and restore its logical media type, taken from the
    /// upstream's logical header or else from the request.
    async fn open(&self, logical: &Request, response: Response) -> Result<Response> {
        if !self.encryption_enabled {
            return Ok(response);
        }
        let Some(body) = response.body().filter(|body| !body.is_empty()) else {
            return Ok(response);
        };

        let key = self.vault.key().await?;
        let plaintext = CryptoCodec::decrypt(body, key)?;
        let content_type = response
            .header(LOGICAL_CONTENT_TYPE_HEADER)
            .unwrap_or_else(|| logical.content_type())
            .to_string();
        Ok(response.replace_body(Some(plaintext)).replace_header(CONTENT_TYPE_HEADER, content_type))
    }

    async fn write_through(&self, logical: &Request, response: &Response) {
        let key = logical.logical_key();
        let Some(body) = response.body() else {
            debug!(key = %key, "empty GET body; not cached");
            return;
        };
        if serde_json::from_slice::<serde_json::Value>(body).is_err() {
            debug!(key = %key, "GET body is not structured data; not cached");
            return;
        }
        if let Err(e) = self.cache.put(&key, response.status(), body).await {
            warn!(key = %key, error = %e, "cache write-through failed");
        }
    }
}

/// Builder for [`InterceptorPipeline`].
#[derive(Default)]
pub struct InterceptorPipelineBuilder {
    transport: Option<Arc<dyn Transport>>,
    monitor: Option<Arc<ConnectivityMonitor>>,
    cache: Option<Arc<ResponseCache>>,
    queue: Option<Arc<PendingRequestQueue>>,
    vault: Option<Arc<KeyVault>>,
    policy: Option<RetryPolicy>,
    sleeper: Option<Arc<dyn Sleeper>>,
    encryption_enabled: Option<bool>,
    auto_chain_writes: Option<bool>,
}

impl InterceptorPipelineBuilder {
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn monitor(mut self, monitor: Arc<ConnectivityMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn queue(mut self, queue: Arc<PendingRequestQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    #[must_use]
    pub fn vault(mut self, vault: Arc<KeyVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Override the backoff clock. Defaults to `tokio::time::sleep`.
    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    #[must_use]
    pub fn encryption_enabled(mut self, enabled: bool) -> Self {
        self.encryption_enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn auto_chain_writes(mut self, enabled: bool) -> Self {
        self.auto_chain_writes = Some(enabled);
        self
    }

    /// # Errors
    /// `Config` when a required component is missing.
    pub fn build(self) -> Result<InterceptorPipeline> {
        let encryption_enabled = self.encryption_enabled.unwrap_or(true);
        if !encryption_enabled {
            warn!("payload encryption disabled; bodies are sent in plaintext");
        }

        Ok(InterceptorPipeline {
            transport: self.transport.ok_or_else(|| missing("transport"))?,
            monitor: self.monitor.ok_or_else(|| missing("monitor"))?,
            cache: self.cache.ok_or_else(|| missing("cache"))?,
            queue: self.queue.ok_or_else(|| missing("queue"))?,
            vault: self.vault.ok_or_else(|| missing("vault"))?,
            policy: self.policy.unwrap_or_default(),
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            encryption_enabled,
            auto_chain_writes: self.auto_chain_writes.unwrap_or(true),
            retry_listeners: RwLock::new(Vec::new()),
        })
    }
}

fn missing(component: &str) -> InterceptError {
    InterceptError::Config(format!("pipeline {component} not configured"))
}

/// State of one call, logged on every transition.
struct CallTrace {
    request_id: Uuid,
    key: LogicalKey,
    state: CallState,
}

impl CallTrace {
    fn new(request: &Request) -> Self {
        Self { request_id: request.id(), key: request.logical_key(), state: CallState::Building }
    }

    fn advance(&mut self, next: CallState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal call transition {} -> {next}",
            self.state
        );
        debug!(request_id = %self.request_id, from = %self.state, to = %next, "call state");
        self.state = next;
    }

    fn fail(&mut self, error: InterceptError) -> SubmitOutcome {
        self.advance(CallState::Failed);
        warn!(request_id = %self.request_id, key = %self.key, error = %error, "call failed");
        SubmitOutcome::Failed(error)
    }
}
