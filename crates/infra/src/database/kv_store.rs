//! SQLite-backed implementation of the durable store port.
//!
//! One `kv_store` row per key. Compare-and-set is a single conditional
//! statement, so it stays atomic across pooled connections and processes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use sealgate_core::{DurableStore, StoreResult};
use tokio::task;
use tracing::{debug, instrument};

use super::manager::{DbManager, SqliteConnection};
use crate::errors::{join_error, IntoStoreError};

const SELECT_SQL: &str = "SELECT value FROM kv_store WHERE key = ?1";
const UPSERT_SQL: &str = "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";
const INSERT_IF_ABSENT_SQL: &str =
    "INSERT OR IGNORE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)";
const UPDATE_IF_EQUAL_SQL: &str =
    "UPDATE kv_store SET value = ?2, updated_at = ?3 WHERE key = ?1 AND value = ?4";
const DELETE_SQL: &str = "DELETE FROM kv_store WHERE key = ?1";

/// Durable key-value store over a pooled SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Arc<DbManager>,
}

impl SqliteStore {
    /// Wrap an existing manager. The schema must already be migrated.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Open the database at `path` and apply migrations.
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> StoreResult<Self> {
        let db = DbManager::new(path, pool_size)?;
        db.run_migrations()?;
        Ok(Self::new(Arc::new(db)))
    }

    pub fn manager(&self) -> &Arc<DbManager> {
        &self.db
    }

    async fn with_connection<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteConnection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> StoreResult<T> {
            let conn = db.get_connection()?;
            op(&conn).map_err(IntoStoreError::into_store_error)
        })
        .await
        .map_err(join_error)?
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let key = key.to_string();
        self.with_connection(move |conn| {
            conn.query_row(SELECT_SQL, params![key], |row| row.get::<_, Vec<u8>>(0)).optional()
        })
        .await
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let key = key.to_string();
        let value = value.to_vec();
        self.with_connection(move |conn| {
            conn.execute(UPSERT_SQL, params![key, value, Utc::now().timestamp()]).map(|_| ())
        })
        .await
    }

    #[instrument(skip(self, expected, new))]
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> StoreResult<bool> {
        let key = key.to_string();
        let expected = expected.map(<[u8]>::to_vec);
        let new = new.to_vec();
        let swapped = self
            .with_connection(move |conn| {
                let now = Utc::now().timestamp();
                let changed = match expected {
                    None => conn.execute(INSERT_IF_ABSENT_SQL, params![key, new, now])?,
                    Some(old) => conn.execute(UPDATE_IF_EQUAL_SQL, params![key, new, now, old])?,
                };
                Ok(changed == 1)
            })
            .await?;
        debug!(swapped, "compare-and-set finished");
        Ok(swapped)
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let key = key.to_string();
        self.with_connection(move |conn| conn.execute(DELETE_SQL, params![key]).map(|_| ())).await
    }
}
