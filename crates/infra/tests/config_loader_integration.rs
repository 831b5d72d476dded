//! Integration tests for configuration loader
//!
//! Tests the end-to-end path from a config file to a running runtime.

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::time::Duration;

use sealgate_domain::ConnectivityState;
use sealgate_infra::{config, SealgateRuntime};
use tempfile::TempDir;

#[tokio::test]
async fn test_runtime_builds_from_toml_file() -> anyhow::Result<()> {
    support::init_tracing();
    let dir = TempDir::new()?;
    let db_path = dir.path().join("from-file.db");
    let config_path = dir.path().join("sealgate.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[storage]
path = "{}"
pool_size = 2

[retry]
max_retries = 5
backoff_ms = 100

[replay]
max_attempts = 2

[pipeline]
auto_chain_writes = false
"#,
            db_path.display().to_string().replace('\\', "\\\\")
        ),
    )?;

    let config = config::load_from_file(Some(config_path))?;
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.backoff, Duration::from_millis(100));
    assert!(config.encryption.enabled);
    let config_timeout = config.transport.timeout;

    let mut runtime = SealgateRuntime::builder(config)
        .initial_state(ConnectivityState::Available)
        .build()
        .await?;
    assert_eq!(runtime.pipeline().policy().max_retries(), 5);
    assert!(runtime.coordinator().join_timeout() >= config_timeout.saturating_mul(6));
    assert!(db_path.exists());

    runtime.start()?;
    assert!(runtime.is_running());
    assert!(runtime.start().is_err());
    runtime.shutdown().await?;
    assert!(!runtime.is_running());
    Ok(())
}

#[test]
fn test_invalid_file_is_rejected_before_any_io() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("sealgate.json");
    std::fs::write(&config_path, r#"{"storage": {"path": "x.db", "pool_size": 0}}"#)
        .expect("write config");

    let result = config::load_from_file(Some(config_path));
    assert!(result.is_err());
}
