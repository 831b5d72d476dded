//! Shared fixtures for infra integration tests.

use std::sync::{Arc, Once};
use std::time::Duration;

use sealgate_core::testing::RecordingSleeper;
use sealgate_domain::{ConnectivityState, SealgateConfig};
use sealgate_infra::SealgateRuntime;
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness so it only shows for
/// failing tests.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Configuration pointing at a fresh database inside `dir`.
pub fn test_config(dir: &TempDir) -> SealgateConfig {
    let mut config = SealgateConfig::default();
    config.storage.path = dir.path().join("sealgate.db");
    config.storage.pool_size = 4;
    config.retry.backoff = Duration::from_millis(250);
    config.transport.timeout = Duration::from_secs(5);
    config
}

/// A runtime over real SQLite and reqwest, with backoff waits recorded
/// instead of slept.
pub struct TestRuntime {
    pub runtime: SealgateRuntime,
    pub sleeper: RecordingSleeper,
    _dir: Arc<TempDir>,
}

impl TestRuntime {
    pub async fn build(dir: Arc<TempDir>, config: SealgateConfig, state: ConnectivityState) -> Self {
        init_tracing();
        let sleeper = RecordingSleeper::new();
        let runtime = SealgateRuntime::builder(config)
            .sleeper(Arc::new(sleeper.clone()))
            .initial_state(state)
            .build()
            .await
            .expect("runtime should build");
        Self { runtime, sleeper, _dir: dir }
    }
}

/// Poll `condition` every 10 ms until it holds or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
