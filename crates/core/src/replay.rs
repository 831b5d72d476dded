//! Background replay of requests deferred while offline.
//!
//! The coordinator wakes on every transition into `Available` and on a slow
//! sweep timer, then drains the queue front to back through
//! [`InterceptorPipeline::execute`]. A pass is bounded by the queue length
//! at its start and stops as soon as connectivity goes away. Outcomes are
//! delivered to listeners registered with
//! [`ReplayCoordinator::on_replay_result`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use sealgate_domain::{
    InterceptError, QueuedRequest, ReplayConfig, ReplayOutcome, ReplayReport, ReplayResult,
    Result, SubscriptionId,
};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::pipeline::InterceptorPipeline;
use crate::queue::PendingRequestQueue;

/// Slack added on top of the longest retry sequence when joining the worker.
const JOIN_GRACE: Duration = Duration::from_secs(5);

type ReplayListener = Arc<dyn Fn(&ReplayOutcome) + Send + Sync>;

struct ReplayShared {
    pipeline: Arc<InterceptorPipeline>,
    queue: Arc<PendingRequestQueue>,
    monitor: Arc<ConnectivityMonitor>,
    max_attempts: u32,
    listeners: RwLock<Vec<ReplayListener>>,
    wake: Notify,
    drain_lock: Mutex<()>,
}

/// Replay worker with explicit lifecycle management.
pub struct ReplayCoordinator {
    shared: Arc<ReplayShared>,
    sweep_interval: Duration,
    join_timeout: Duration,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
    subscription: Option<SubscriptionId>,
}

impl std::fmt::Debug for ReplayCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayCoordinator")
            .field("max_attempts", &self.shared.max_attempts)
            .field("sweep_interval", &self.sweep_interval)
            .field("join_timeout", &self.join_timeout)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ReplayCoordinator {
    /// The join budget defaults to one full retry sequence of the pipeline's
    /// policy plus a grace period, since an in-flight replay is never cut
    /// short.
    pub fn new(pipeline: Arc<InterceptorPipeline>, config: &ReplayConfig) -> Self {
        let policy = pipeline.policy();
        let join_timeout =
            JOIN_GRACE.saturating_add(policy.backoff().saturating_mul(policy.max_retries()));
        let shared = ReplayShared {
            queue: Arc::clone(pipeline.queue()),
            monitor: Arc::clone(pipeline.monitor()),
            pipeline,
            max_attempts: config.max_attempts.max(1),
            listeners: RwLock::new(Vec::new()),
            wake: Notify::new(),
            drain_lock: Mutex::new(()),
        };
        Self {
            shared: Arc::new(shared),
            sweep_interval: config.sweep_interval,
            join_timeout,
            cancellation: CancellationToken::new(),
            task_handle: None,
            subscription: None,
        }
    }

    /// Override how long [`ReplayCoordinator::stop`] waits for the worker.
    ///
    /// Callers that know the transport timeout should include it, since
    /// every attempt of an in-flight replay may take that long.
    #[must_use]
    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    pub const fn join_timeout(&self) -> Duration {
        self.join_timeout
    }

    /// Register a listener for the outcome of every replayed request.
    pub fn on_replay_result<F>(&self, listener: F)
    where
        F: Fn(&ReplayOutcome) + Send + Sync + 'static,
    {
        self.shared.listeners.write().push(Arc::new(listener));
    }

    /// Subscribe to connectivity and spawn the drain loop.
    ///
    /// # Errors
    /// `Internal` when already running.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(InterceptError::Internal("replay coordinator already running".into()));
        }

        self.cancellation = CancellationToken::new();

        let weak: Weak<ReplayShared> = Arc::downgrade(&self.shared);
        self.subscription = Some(self.shared.monitor.subscribe(move |state| {
            if state.is_available() {
                if let Some(shared) = weak.upgrade() {
                    shared.wake.notify_one();
                }
            }
        }));

        // Anything left over from a previous run gets a pass straight away.
        self.shared.wake.notify_one();

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancellation.clone();
        let sweep_interval = self.sweep_interval;
        self.task_handle = Some(tokio::spawn(async move {
            Self::drain_loop(shared, sweep_interval, cancel).await;
        }));

        info!(
            sweep_ms = u64::try_from(sweep_interval.as_millis()).unwrap_or(u64::MAX),
            "replay coordinator started"
        );
        Ok(())
    }

    /// Unsubscribe, cancel the loop, and wait for it to finish.
    ///
    /// # Errors
    /// `Internal` when not running, when the task panicked, or when it did
    /// not finish within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(InterceptError::Internal("replay coordinator not running".into()));
        }

        if let Some(id) = self.subscription.take() {
            self.shared.monitor.unsubscribe(id);
        }
        self.cancellation.cancel();

        let joined = match self.task_handle.take() {
            Some(handle) => tokio::time::timeout(self.join_timeout, handle).await,
            None => Ok(Ok(())),
        };
        // A fresh token keeps `drain_now` usable after the worker is gone.
        self.cancellation = CancellationToken::new();

        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "replay task panicked");
                return Err(InterceptError::Internal("replay task panicked".into()));
            }
            Err(_) => {
                warn!(
                    timeout_ms = u64::try_from(self.join_timeout.as_millis()).unwrap_or(u64::MAX),
                    "replay task did not complete within timeout"
                );
                return Err(InterceptError::Internal("replay task join timed out".into()));
            }
        }

        info!("replay coordinator stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Run one drain pass now, waiting for any pass already in progress.
    pub async fn drain_now(&self) -> ReplayReport {
        self.shared.drain(&self.cancellation).await
    }

    async fn drain_loop(
        shared: Arc<ReplayShared>,
        sweep_interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("replay loop cancelled");
                    break;
                }
                _ = shared.wake.notified() => debug!("replay woken by connectivity"),
                _ = tokio::time::sleep(sweep_interval) => debug!("replay sweep"),
            }

            if !shared.monitor.current_state().is_available() {
                continue;
            }
            let report = shared.drain(&cancel).await;
            if report.processed() > 0 || report.interrupted {
                info!(
                    completed = report.completed,
                    requeued = report.requeued,
                    dropped = report.dropped,
                    interrupted = report.interrupted,
                    "replay pass finished"
                );
            }
        }
    }
}

impl ReplayShared {
    async fn drain(&self, cancel: &CancellationToken) -> ReplayReport {
        let _pass = self.drain_lock.lock().await;
        let mut report = ReplayReport::default();

        let budget = self.queue.len().await;
        for _ in 0..budget {
            if cancel.is_cancelled() || !self.monitor.current_state().is_available() {
                report.interrupted = true;
                break;
            }

            let entry = match self.queue.peek().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "pending queue unreadable; ending pass");
                    break;
                }
            };

            match self.pipeline.execute(&entry.request).await {
                Ok(response) => {
                    if let Err(e) = self.queue.acknowledge(entry.id).await {
                        warn!(queued_id = %entry.id, error = %e, "acknowledge failed; ending pass");
                        break;
                    }
                    report.completed += 1;
                    self.emit(&entry, entry.attempts_so_far, ReplayResult::Completed(response));
                }
                Err(e) if e.is_unreachable() => {
                    info!(queued_id = %entry.id, "upstream unreachable; pausing replay");
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    if !self.record_failure(&entry, e, &mut report).await {
                        break;
                    }
                }
            }
        }
        report
    }

    /// Requeue or drop a failed entry. Returns false when the queue could not
    /// be updated.
    async fn record_failure(
        &self,
        entry: &QueuedRequest,
        error: InterceptError,
        report: &mut ReplayReport,
    ) -> bool {
        let attempts = entry.attempts_so_far.saturating_add(1);

        if attempts >= self.max_attempts {
            if let Err(e) = self.queue.acknowledge(entry.id).await {
                warn!(queued_id = %entry.id, error = %e, "dropping exhausted entry failed");
                return false;
            }
            error!(queued_id = %entry.id, attempts, error = %error, "replay abandoned");
            report.dropped += 1;
            let exhausted =
                InterceptError::QueueExhausted { attempts, last_error: error.to_string() };
            self.emit(entry, attempts, ReplayResult::Dropped(exhausted));
            return true;
        }

        if let Err(e) = self.queue.requeue_front(entry.id).await {
            warn!(queued_id = %entry.id, error = %e, "requeue failed");
            return false;
        }
        debug!(queued_id = %entry.id, attempts, error = %error, "replay failed; requeued");
        report.requeued += 1;
        self.emit(entry, attempts, ReplayResult::Requeued(error));
        true
    }

    fn emit(&self, entry: &QueuedRequest, attempts_so_far: u32, result: ReplayResult) {
        let outcome = ReplayOutcome {
            queued_id: entry.id,
            request_id: entry.request.id(),
            logical_key: entry.request.logical_key(),
            attempts_so_far,
            result,
        };
        let listeners: Vec<ReplayListener> = self.listeners.read().clone();
        for listener in listeners {
            listener(&outcome);
        }
    }
}

impl Drop for ReplayCoordinator {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ReplayCoordinator dropped while running; cancelling");
            if let Some(id) = self.subscription.take() {
                self.shared.monitor.unsubscribe(id);
            }
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use sealgate_domain::{ConnectivityState, ErrorKind, Request, Response};

    use super::*;
    use crate::cache::ResponseCache;
    use crate::crypto::KeyVault;
    use crate::ports::{DurableStore, Sleeper, TokioSleeper};
    use crate::retry::RetryPolicy;
    use crate::testing::{MemoryStore, RecordingSleeper, ScriptedTransport};

    struct Harness {
        transport: Arc<ScriptedTransport>,
        monitor: Arc<ConnectivityMonitor>,
        queue: Arc<PendingRequestQueue>,
        coordinator: ReplayCoordinator,
    }

    async fn harness(transport: ScriptedTransport, max_attempts: u32) -> Harness {
        harness_with(
            transport,
            max_attempts,
            RetryPolicy::new(0, Duration::from_millis(1)),
            Arc::new(RecordingSleeper::new()),
        )
        .await
    }

    async fn harness_with(
        transport: ScriptedTransport,
        max_attempts: u32,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Harness {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let transport = Arc::new(transport);
        let monitor = Arc::new(ConnectivityMonitor::new(ConnectivityState::Unavailable));
        let queue = Arc::new(PendingRequestQueue::open(Arc::clone(&store)).await.unwrap());

        let pipeline = InterceptorPipeline::builder()
            .transport(transport.clone())
            .monitor(Arc::clone(&monitor))
            .cache(Arc::new(ResponseCache::new(Arc::clone(&store))))
            .queue(Arc::clone(&queue))
            .vault(Arc::new(KeyVault::new(Arc::clone(&store))))
            .policy(policy)
            .sleeper(sleeper)
            .encryption_enabled(false)
            .build()
            .unwrap();

        let config = ReplayConfig { max_attempts, sweep_interval: Duration::from_secs(3_600) };
        let coordinator = ReplayCoordinator::new(Arc::new(pipeline), &config);
        Harness { transport, monitor, queue, coordinator }
    }

    fn ok_transport() -> ScriptedTransport {
        ScriptedTransport::with_fallback(|_| Ok(Response::new(200)))
    }

    fn get(path: &str) -> Request {
        Request::get(format!("https://api.example.com{path}")).build().unwrap()
    }

    fn recorder(coordinator: &ReplayCoordinator) -> Arc<parking_lot::Mutex<Vec<ReplayOutcome>>> {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        coordinator.on_replay_result(move |outcome| sink.lock().push(outcome.clone()));
        seen
    }

    async fn wait_until_empty(queue: &PendingRequestQueue) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !queue.is_empty().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("queue was not drained in time");
    }

    /// Validates `ReplayCoordinator` behavior for the connectivity restored
    /// scenario.
    ///
    /// Assertions:
    /// - One pending request is resubmitted exactly once.
    /// - The queue is empty afterwards and the listener sees `Completed`.
    #[tokio::test]
    async fn test_transition_to_available_replays_once() {
        let mut h = harness(ok_transport(), 3).await;
        let seen = recorder(&h.coordinator);
        h.queue.enqueue(get("/posts/1")).await.unwrap();

        h.coordinator.start().unwrap();
        h.monitor.report(ConnectivityState::Available);
        wait_until_empty(&h.queue).await;
        h.coordinator.stop().await.unwrap();

        assert_eq!(h.transport.sent_count(), 1);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0].result, ReplayResult::Completed(_)));
    }

    #[tokio::test]
    async fn test_drain_preserves_fifo() {
        let h = harness(ok_transport(), 3).await;
        for path in ["/1", "/2", "/3"] {
            h.queue.enqueue(get(path)).await.unwrap();
        }
        h.monitor.report(ConnectivityState::Available);

        let report = h.coordinator.drain_now().await;

        assert_eq!(report.completed, 3);
        let paths: Vec<String> =
            h.transport.sent().iter().map(|r| r.target().path().to_string()).collect();
        assert_eq!(paths, vec!["/1", "/2", "/3"]);
    }

    /// Validates `ReplayCoordinator::drain_now` behavior for the connectivity
    /// lost mid-drain scenario.
    ///
    /// Assertions:
    /// - The pass stops after the in-flight item and reports interruption.
    /// - Remaining entries keep their relative order.
    #[tokio::test]
    async fn test_connectivity_loss_stops_drain() {
        let monitor_slot: Arc<parking_lot::Mutex<Option<Arc<ConnectivityMonitor>>>> =
            Arc::new(parking_lot::Mutex::new(None));
        let flip = Arc::clone(&monitor_slot);
        let transport = ScriptedTransport::with_fallback(move |_| {
            if let Some(monitor) = flip.lock().as_ref() {
                monitor.report(ConnectivityState::Unavailable);
            }
            Ok(Response::new(200))
        });
        let h = harness(transport, 3).await;
        *monitor_slot.lock() = Some(Arc::clone(&h.monitor));
        for path in ["/1", "/2", "/3"] {
            h.queue.enqueue(get(path)).await.unwrap();
        }
        h.monitor.report(ConnectivityState::Available);

        let report = h.coordinator.drain_now().await;

        assert_eq!(report.completed, 1);
        assert!(report.interrupted);
        assert_eq!(h.queue.dequeue().await.unwrap().unwrap().request.target().path(), "/2");
        assert_eq!(h.queue.dequeue().await.unwrap().unwrap().request.target().path(), "/3");
    }

    /// Validates `ReplayCoordinator::drain_now` behavior for the attempt
    /// ceiling scenario.
    ///
    /// Assertions:
    /// - A failing entry is requeued with its attempt count raised.
    /// - At the ceiling it is dropped and reported as `QueueExhausted`.
    #[tokio::test]
    async fn test_failures_requeue_then_drop() {
        let transport = ScriptedTransport::with_fallback(|_| Ok(Response::new(400)));
        let h = harness(transport, 2).await;
        let seen = recorder(&h.coordinator);
        h.queue.enqueue(get("/a")).await.unwrap();
        h.queue.enqueue(get("/b")).await.unwrap();
        h.monitor.report(ConnectivityState::Available);

        let first = h.coordinator.drain_now().await;
        assert_eq!(first.requeued, 2);
        let front = h.queue.peek().await.unwrap().unwrap();
        assert_eq!(front.request.target().path(), "/a");
        assert_eq!(front.attempts_so_far, 1);

        let second = h.coordinator.drain_now().await;
        assert_eq!(second.dropped, 2);
        assert!(h.queue.is_empty().await);

        let seen = seen.lock();
        assert_eq!(seen.len(), 4);
        let ReplayResult::Dropped(err) = &seen[2].result else {
            panic!("expected drop, got {:?}", seen[2].result);
        };
        assert_eq!(err.kind(), ErrorKind::QueueExhausted);
        assert_eq!(seen[2].attempts_so_far, 2);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_pauses_without_penalty() {
        let h = harness(ScriptedTransport::new(), 3).await;
        h.queue.enqueue(get("/posts/1")).await.unwrap();
        h.monitor.report(ConnectivityState::Available);

        let report = h.coordinator.drain_now().await;

        assert!(report.interrupted);
        assert_eq!(report.processed(), 0);
        assert_eq!(h.queue.peek().await.unwrap().unwrap().attempts_so_far, 0);
    }

    #[tokio::test]
    async fn test_drain_while_offline_does_nothing() {
        let h = harness(ok_transport(), 3).await;
        h.queue.enqueue(get("/posts/1")).await.unwrap();

        let report = h.coordinator.drain_now().await;

        assert!(report.interrupted);
        assert_eq!(h.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let mut h = harness(ok_transport(), 3).await;
        assert!(h.coordinator.stop().await.is_err());

        h.coordinator.start().unwrap();
        assert!(h.coordinator.start().is_err());
        h.coordinator.stop().await.unwrap();
        assert!(!h.coordinator.is_running());
    }

    /// Validates `ReplayCoordinator::stop` behavior for the stop during
    /// backoff scenario.
    ///
    /// Assertions:
    /// - The default join budget covers the whole retry sequence.
    /// - Stopping while the in-flight replay sleeps between attempts waits
    ///   for it and succeeds.
    /// - Every attempt of the sequence reached the transport.
    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_out_retry_backoff() {
        let transport = ScriptedTransport::with_fallback(|_| Ok(Response::new(503)));
        let policy = RetryPolicy::default();
        let backoff_total = policy.backoff().saturating_mul(policy.max_retries());
        let mut h = harness_with(transport, 3, policy, Arc::new(TokioSleeper)).await;
        assert!(h.coordinator.join_timeout() > backoff_total);
        h.queue.enqueue(get("/posts/1")).await.unwrap();

        h.coordinator.start().unwrap();
        h.monitor.report(ConnectivityState::Available);
        while h.transport.sent_count() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        h.coordinator.stop().await.unwrap();

        assert!(!h.coordinator.is_running());
        assert_eq!(h.transport.sent_count(), 4);
        assert_eq!(h.queue.peek().await.unwrap().unwrap().attempts_so_far, 1);
    }

    /// Validates `ReplayCoordinator::drain_now` behavior for the drain after
    /// stop scenario.
    ///
    /// Assertions:
    /// - A manual pass after `stop` still replays pending entries.
    /// - The pass is not reported as interrupted.
    #[tokio::test]
    async fn test_drain_now_works_after_stop() {
        let mut h = harness(ok_transport(), 3).await;
        h.coordinator.start().unwrap();
        h.coordinator.stop().await.unwrap();

        h.queue.enqueue(get("/posts/1")).await.unwrap();
        h.monitor.report(ConnectivityState::Available);
        let report = h.coordinator.drain_now().await;

        assert_eq!(report.completed, 1);
        assert!(!report.interrupted);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_with_join_timeout_overrides_default() {
        let h = harness(ok_transport(), 3).await;
        let coordinator = h.coordinator.with_join_timeout(Duration::from_secs(42));
        assert_eq!(coordinator.join_timeout(), Duration::from_secs(42));
    }
}
