//! Durable FIFO of requests deferred for lack of connectivity.
//!
//! Layout in the store:
//! - `queue:meta` holds the `{head, tail}` cursor; live entries occupy
//!   sequence numbers `head..tail`.
//! - `queue:{seq:020}` holds one JSON-encoded [`QueuedRequest`].
//!
//! Writes order entry-then-cursor on append and cursor-then-entry on removal,
//! so a crash between the two leaves at most an orphaned record outside the
//! live range. Every read-modify-write runs under one async mutex.

use std::sync::Arc;

use sealgate_domain::constants::{QUEUE_META_KEY, QUEUE_PREFIX};
use sealgate_domain::{InterceptError, QueuedRequest, Request, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::ports::DurableStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct QueueCursor {
    head: u64,
    tail: u64,
}

impl QueueCursor {
    const fn len(self) -> u64 {
        self.tail.saturating_sub(self.head)
    }
}

pub struct PendingRequestQueue {
    store: Arc<dyn DurableStore>,
    cursor: Mutex<QueueCursor>,
}

impl std::fmt::Debug for PendingRequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequestQueue").finish_non_exhaustive()
    }
}

impl PendingRequestQueue {
    /// Open the queue, restoring the cursor persisted by a previous process.
    ///
    /// # Errors
    /// `Storage` if the store is unreadable, `MalformedData` if the cursor
    /// record is corrupt.
    #[instrument(skip(store))]
    pub async fn open(store: Arc<dyn DurableStore>) -> Result<Self> {
        let cursor = match store.get(QUEUE_META_KEY).await? {
            Some(raw) => serde_json::from_slice::<QueueCursor>(&raw).map_err(|e| {
                InterceptError::MalformedData(format!("queue cursor unreadable: {e}"))
            })?,
            None => QueueCursor::default(),
        };
        info!(pending = cursor.len(), "pending request queue opened");
        Ok(Self { store, cursor: Mutex::new(cursor) })
    }

    fn slot(seq: u64) -> String {
        format!("{QUEUE_PREFIX}{seq:020}")
    }

    async fn persist_cursor(&self, cursor: QueueCursor) -> Result<()> {
        self.store.put(QUEUE_META_KEY, &serde_json::to_vec(&cursor)?).await?;
        Ok(())
    }

    async fn push_back_locked(&self, cursor: &mut QueueCursor, entry: &QueuedRequest) -> Result<()> {
        let record = serde_json::to_vec(entry)?;
        self.store.put(&Self::slot(cursor.tail), &record).await?;

        let next = QueueCursor { head: cursor.head, tail: cursor.tail + 1 };
        self.persist_cursor(next).await?;
        *cursor = next;
        Ok(())
    }

    async fn pop_front_locked(&self, cursor: &mut QueueCursor) -> Result<()> {
        let seq = cursor.head;
        let next = QueueCursor { head: seq + 1, tail: cursor.tail };
        self.persist_cursor(next).await?;
        *cursor = next;
        self.store.remove(&Self::slot(seq)).await?;
        Ok(())
    }

    /// Front entry, discarding unreadable records on the way.
    async fn front_locked(&self, cursor: &mut QueueCursor) -> Result<Option<QueuedRequest>> {
        while cursor.len() > 0 {
            let seq = cursor.head;
            match self.store.get(&Self::slot(seq)).await? {
                Some(raw) => match serde_json::from_slice::<QueuedRequest>(&raw) {
                    Ok(entry) => return Ok(Some(entry)),
                    Err(e) => warn!(seq, error = %e, "dropping unreadable queue entry"),
                },
                None => warn!(seq, "queue entry missing; skipping"),
            }
            self.pop_front_locked(cursor).await?;
        }
        Ok(None)
    }

    /// Append `request` at the back.
    #[instrument(skip(self, request), fields(request_id = %request.id()))]
    pub async fn enqueue(&self, request: Request) -> Result<QueuedRequest> {
        let entry = QueuedRequest::new(request);
        let mut cursor = self.cursor.lock().await;
        self.push_back_locked(&mut cursor, &entry).await?;
        debug!(queued_id = %entry.id, pending = cursor.len(), "request enqueued");
        Ok(entry)
    }

    /// Oldest entry without removing it.
    pub async fn peek(&self) -> Result<Option<QueuedRequest>> {
        let mut cursor = self.cursor.lock().await;
        self.front_locked(&mut cursor).await
    }

    /// Remove and return the oldest entry.
    pub async fn dequeue(&self) -> Result<Option<QueuedRequest>> {
        let mut cursor = self.cursor.lock().await;
        let front = self.front_locked(&mut cursor).await?;
        if front.is_some() {
            self.pop_front_locked(&mut cursor).await?;
        }
        Ok(front)
    }

    /// Remove the front entry if it is `id`. Returns whether it was removed.
    pub async fn acknowledge(&self, id: Uuid) -> Result<bool> {
        let mut cursor = self.cursor.lock().await;
        match self.front_locked(&mut cursor).await? {
            Some(front) if front.id == id => {
                self.pop_front_locked(&mut cursor).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Move the front entry `id` to the back with one more recorded attempt.
    ///
    /// Returns the re-appended entry, or `None` if `id` is not at the front.
    pub async fn requeue_front(&self, id: Uuid) -> Result<Option<QueuedRequest>> {
        let mut cursor = self.cursor.lock().await;
        let Some(front) = self.front_locked(&mut cursor).await? else {
            return Ok(None);
        };
        if front.id != id {
            return Ok(None);
        }

        let retried = front.next_attempt();
        self.push_back_locked(&mut cursor, &retried).await?;
        self.pop_front_locked(&mut cursor).await?;
        debug!(queued_id = %id, attempts = retried.attempts_so_far, "request moved to back");
        Ok(Some(retried))
    }

    pub async fn len(&self) -> usize {
        usize::try_from(self.cursor.lock().await.len()).unwrap_or(usize::MAX)
    }

    pub async fn is_empty(&self) -> bool {
        self.cursor.lock().await.len() == 0
    }
}
