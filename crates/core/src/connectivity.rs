//! Connectivity state with change subscriptions.
//!
//! The current state is held in a `watch` channel so reads never block.
//! Transitions are queued to a dedicated dispatcher thread, which runs the
//! listeners one transition at a time in the order they occurred. A
//! listener may call back into [`report`]; the nested transition is
//! delivered after the current one.
//!
//! [`report`]: ConnectivityMonitor::report

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use sealgate_domain::{ConnectivityState, SubscriptionId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ports::ReachabilityProbe;

type Listener = Arc<dyn Fn(ConnectivityState) + Send + Sync>;
type Listeners = Arc<Mutex<BTreeMap<SubscriptionId, Listener>>>;

pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivityState>,
    listeners: Listeners,
    delivery: Mutex<Option<mpsc::UnboundedSender<ConnectivityState>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("state", &self.current_state())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl ConnectivityMonitor {
    /// Create a monitor and its dispatcher thread. The thread exits once the
    /// monitor is dropped.
    pub fn new(initial: ConnectivityState) -> Self {
        let (state, _) = watch::channel(initial);
        let listeners: Listeners = Arc::default();
        let (tx, rx) = mpsc::unbounded_channel();

        let dispatch_to = Arc::clone(&listeners);
        let delivery = match thread::Builder::new()
            .name("sealgate-connectivity".into())
            .spawn(move || dispatch(rx, &dispatch_to))
        {
            Ok(_) => Some(tx),
            Err(e) => {
                warn!(error = %e, "connectivity dispatcher unavailable; delivering inline");
                None
            }
        };

        Self { state, listeners, delivery: Mutex::new(delivery), next_id: AtomicU64::new(1) }
    }

    /// Non-blocking snapshot of the current state.
    pub fn current_state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    /// Receiver for async code that wants to await a change.
    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Register `callback` for every future transition.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConnectivityState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, Arc::new(callback));
        debug!(subscription = id.0, "connectivity listener registered");
        id
    }

    /// Remove a listener. Returns whether it was registered; repeating the
    /// call is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    /// Record the latest observation. Listeners are notified only on a
    /// change, on the dispatcher thread.
    ///
    /// Returns whether a transition happened.
    pub fn report(&self, state: ConnectivityState) -> bool {
        let inline = {
            let delivery = self.delivery.lock();
            let previous = self.state.send_replace(state);
            if previous == state {
                return false;
            }
            info!(from = %previous, to = %state, "connectivity changed");
            !delivery.as_ref().is_some_and(|tx| tx.send(state).is_ok())
        };

        if inline {
            notify(&self.listeners, state);
        }
        true
    }

    /// Poll `probe` every `interval` and feed the results into
    /// [`ConnectivityMonitor::report`] until `cancel` fires.
    pub fn start_polling(
        self: &Arc<Self>,
        probe: Arc<dyn ReachabilityProbe>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            debug!(
                interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                "connectivity polling started"
            );
            loop {
                let reachable = tokio::select! {
                    _ = cancel.cancelled() => break,
                    reachable = probe.is_reachable() => reachable,
                };
                monitor.report(ConnectivityState::from_reachable(reachable));

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!("connectivity polling stopped");
        })
    }
}

fn dispatch(mut rx: mpsc::UnboundedReceiver<ConnectivityState>, listeners: &Listeners) {
    while let Some(state) = rx.blocking_recv() {
        notify(listeners, state);
    }
    debug!("connectivity dispatcher stopped");
}

fn notify(listeners: &Listeners, state: ConnectivityState) {
    let snapshot: Vec<Listener> = listeners.lock().values().cloned().collect();
    for listener in snapshot {
        listener(state);
    }
}
