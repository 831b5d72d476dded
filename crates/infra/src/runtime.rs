//! Wiring of the concrete adapters into a running interceptor.
//!
//! ```no_run
//! use sealgate_domain::{Request, SealgateConfig};
//! use sealgate_infra::SealgateRuntime;
//!
//! # async fn example() -> sealgate_domain::Result<()> {
//! let mut runtime = SealgateRuntime::builder(SealgateConfig::default()).build().await?;
//! runtime.on_replay_result(|outcome| tracing::info!(?outcome, "replayed"));
//! runtime.start()?;
//!
//! let outcome = runtime.submit(Request::get("https://api.example.com/posts/1").build()?).await;
//! tracing::info!(?outcome, "submitted");
//!
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use sealgate_core::{
    ConnectivityMonitor, DurableStore, InterceptorPipeline, KeyVault, PendingRequestQueue,
    ReachabilityProbe, ReplayCoordinator, ResponseCache, RetryPolicy, Sleeper, Transport,
};
use sealgate_domain::{
    ConnectivityState, InterceptError, ReplayOutcome, Request, Result, RetryNotice,
    SealgateConfig, SubmitOutcome,
};
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::database::SqliteStore;
use crate::http::{HttpReachabilityProbe, ReqwestTransport};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A fully wired interceptor plus its background tasks.
pub struct SealgateRuntime {
    config: SealgateConfig,
    pipeline: Arc<InterceptorPipeline>,
    coordinator: ReplayCoordinator,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    polling_cancel: CancellationToken,
    polling_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SealgateRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealgateRuntime")
            .field("pipeline", &self.pipeline)
            .field("coordinator", &self.coordinator)
            .field("polling", &self.polling_handle.is_some())
            .finish()
    }
}

impl SealgateRuntime {
    pub fn builder(config: SealgateConfig) -> SealgateRuntimeBuilder {
        SealgateRuntimeBuilder::new(config)
    }

    pub const fn config(&self) -> &SealgateConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<InterceptorPipeline> {
        &self.pipeline
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        self.pipeline.monitor()
    }

    pub fn queue(&self) -> &Arc<PendingRequestQueue> {
        self.pipeline.queue()
    }

    pub const fn coordinator(&self) -> &ReplayCoordinator {
        &self.coordinator
    }

    pub async fn submit(&self, request: Request) -> SubmitOutcome {
        self.pipeline.submit(request).await
    }

    pub fn on_retry<F>(&self, listener: F)
    where
        F: Fn(&RetryNotice) + Send + Sync + 'static,
    {
        self.pipeline.on_retry(listener);
    }

    pub fn on_replay_result<F>(&self, listener: F)
    where
        F: Fn(&ReplayOutcome) + Send + Sync + 'static,
    {
        self.coordinator.on_replay_result(listener);
    }

    pub fn is_running(&self) -> bool {
        self.coordinator.is_running()
    }

    /// Start connectivity polling (when a probe is configured) and replay.
    ///
    /// # Errors
    /// `Internal` when already running.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(InterceptError::Internal("runtime already running".into()));
        }

        if let Some(probe) = &self.probe {
            self.polling_cancel = CancellationToken::new();
            self.polling_handle = Some(self.monitor().start_polling(
                Arc::clone(probe),
                self.config.connectivity.poll_interval,
                self.polling_cancel.clone(),
            ));
        }
        self.coordinator.start()?;

        info!(polling = self.polling_handle.is_some(), "sealgate runtime started");
        Ok(())
    }

    /// Stop polling and replay, waiting for both tasks.
    ///
    /// # Errors
    /// `Internal` when a background task panicked or did not stop in time.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) -> Result<()> {
        self.polling_cancel.cancel();
        if let Some(handle) = self.polling_handle.take() {
            match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "connectivity polling task panicked"),
                Err(_) => warn!("connectivity polling did not stop within timeout"),
            }
        }

        if self.coordinator.is_running() {
            self.coordinator.stop().await?;
        }
        info!("sealgate runtime stopped");
        Ok(())
    }
}

impl Drop for SealgateRuntime {
    fn drop(&mut self) {
        if self.polling_handle.is_some() {
            warn!("SealgateRuntime dropped while polling; cancelling");
            self.polling_cancel.cancel();
        }
    }
}

/// Builder for [`SealgateRuntime`].
///
/// Every port defaults to the adapter named by the configuration and can be
/// replaced, which is how tests inject in-memory doubles.
pub struct SealgateRuntimeBuilder {
    config: SealgateConfig,
    store: Option<Arc<dyn DurableStore>>,
    transport: Option<Arc<dyn Transport>>,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    initial_state: Option<ConnectivityState>,
}

impl SealgateRuntimeBuilder {
    pub fn new(config: SealgateConfig) -> Self {
        Self {
            config,
            store: None,
            transport: None,
            probe: None,
            sleeper: None,
            initial_state: None,
        }
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Connectivity before the first probe. Without a probe or an explicit
    /// state the runtime starts `Available`.
    #[must_use]
    pub fn initial_state(mut self, state: ConnectivityState) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Validate the configuration and assemble every component.
    ///
    /// # Errors
    /// - `Config` for invalid settings or an unusable probe URL.
    /// - `Storage` when the database cannot be opened or the payload key
    ///   cannot be resolved.
    #[instrument(skip(self))]
    pub async fn build(self) -> Result<SealgateRuntime> {
        let config = self.config;
        config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => {
                let path = config.storage.path.clone();
                let pool_size = config.storage.pool_size;
                let store = task::spawn_blocking(move || SqliteStore::open(path, pool_size))
                    .await
                    .map_err(|e| InterceptError::Internal(format!("store open task failed: {e}")))??;
                Arc::new(store) as Arc<dyn DurableStore>
            }
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::from_config(&config.transport)?),
        };

        let probe = match (self.probe, &config.connectivity.probe_url) {
            (Some(probe), _) => Some(probe),
            (None, Some(url)) => Some(Arc::new(HttpReachabilityProbe::new(
                url,
                config.connectivity.probe_timeout,
            )?) as Arc<dyn ReachabilityProbe>),
            (None, None) => None,
        };

        let initial_state = match (self.initial_state, &probe) {
            (Some(state), _) => state,
            (None, Some(probe)) => ConnectivityState::from_reachable(probe.is_reachable().await),
            (None, None) => ConnectivityState::Available,
        };
        let monitor = Arc::new(ConnectivityMonitor::new(initial_state));

        let vault = Arc::new(KeyVault::new(Arc::clone(&store)));
        if config.encryption.enabled {
            vault.key().await?;
        }

        let queue = Arc::new(PendingRequestQueue::open(Arc::clone(&store)).await?);
        let cache = Arc::new(ResponseCache::new(Arc::clone(&store)));

        let mut pipeline = InterceptorPipeline::builder()
            .transport(transport)
            .monitor(monitor)
            .cache(cache)
            .queue(queue)
            .vault(vault)
            .policy(RetryPolicy::from_config(&config.retry))
            .encryption_enabled(config.encryption.enabled)
            .auto_chain_writes(config.pipeline.auto_chain_writes);
        if let Some(sleeper) = self.sleeper {
            pipeline = pipeline.sleeper(sleeper);
        }
        let pipeline = Arc::new(pipeline.build()?);

        let coordinator = ReplayCoordinator::new(Arc::clone(&pipeline), &config.replay);
        let attempts = config.retry.max_retries.saturating_add(1);
        let join_timeout = coordinator
            .join_timeout()
            .saturating_add(config.transport.timeout.saturating_mul(attempts));
        let coordinator = coordinator.with_join_timeout(join_timeout);

        info!(
            connectivity = %initial_state,
            encryption = config.encryption.enabled,
            probing = probe.is_some(),
            "sealgate runtime assembled"
        );

        Ok(SealgateRuntime {
            config,
            pipeline,
            coordinator,
            probe,
            polling_cancel: CancellationToken::new(),
            polling_handle: None,
        })
    }
}
