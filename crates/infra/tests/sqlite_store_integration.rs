//! Integration tests for the SQLite-backed durable store
//!
//! **Coverage:**
//! - Values survive closing and reopening the database file
//! - Concurrent `compare_and_set` on an absent key has a single winner
//! - The pending-request queue and payload key survive a restart

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::Arc;

use sealgate_core::{DurableStore, KeyVault, PendingRequestQueue};
use sealgate_domain::Request;
use sealgate_infra::SqliteStore;
use tempfile::TempDir;

fn open(dir: &TempDir) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open(dir.path().join("store.db"), 4).expect("store should open"))
}

/// Validates `SqliteStore` behavior for the reopen scenario.
///
/// Assertions:
/// - A value written before the store is dropped is readable after reopen.
/// - A removed key stays removed.
#[tokio::test]
async fn values_survive_reopen() -> anyhow::Result<()> {
    support::init_tracing();
    let dir = TempDir::new()?;

    {
        let store = open(&dir);
        store.put("cache:GET /a", b"one").await?;
        store.put("cache:GET /b", b"two").await?;
        store.remove("cache:GET /b").await?;
    }

    let store = open(&dir);
    assert_eq!(store.get("cache:GET /a").await?, Some(b"one".to_vec()));
    assert_eq!(store.get("cache:GET /b").await?, None);
    Ok(())
}

/// Validates `SqliteStore::compare_and_set` behavior for the concurrent
/// first-writer scenario.
///
/// Assertions:
/// - Of 8 racing "only if absent" writes exactly one succeeds.
/// - The stored value is the winner's.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_insert_if_absent_has_one_winner() -> anyhow::Result<()> {
    support::init_tracing();
    let dir = TempDir::new()?;
    let store = open(&dir);

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let won = store.compare_and_set("secret:payload-key", None, &[i]).await?;
            Ok::<_, sealgate_core::StoreError>((i, won))
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (i, won) = handle.await??;
        if won {
            winners.push(i);
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(store.get("secret:payload-key").await?, Some(vec![winners[0]]));
    Ok(())
}

/// Validates `PendingRequestQueue` behavior over SQLite for the restart
/// scenario.
///
/// Assertions:
/// - Entries enqueued before a restart come back in FIFO order.
/// - The payload key resolved before the restart is the one resolved after.
#[tokio::test]
async fn queue_and_key_survive_restart() -> anyhow::Result<()> {
    support::init_tracing();
    let dir = TempDir::new()?;

    let key_before = {
        let store: Arc<dyn DurableStore> = open(&dir);
        let queue = PendingRequestQueue::open(Arc::clone(&store)).await?;
        queue.enqueue(Request::put("https://api.example.com/posts/1").body("first").build()?).await?;
        queue.enqueue(Request::put("https://api.example.com/posts/2").body("second").build()?).await?;

        let vault = KeyVault::new(store);
        vault.key().await?.expose().to_vec()
    };

    let store: Arc<dyn DurableStore> = open(&dir);
    let queue = PendingRequestQueue::open(Arc::clone(&store)).await?;
    assert_eq!(queue.len().await, 2);

    let first = queue.dequeue().await?.expect("first entry");
    let second = queue.dequeue().await?.expect("second entry");
    assert_eq!(first.request.target().path(), "/posts/1");
    assert_eq!(second.request.target().path(), "/posts/2");
    assert!(queue.dequeue().await?.is_none());

    let vault = KeyVault::new(store);
    assert_eq!(vault.key().await?.expose(), key_before.as_slice());
    Ok(())
}
