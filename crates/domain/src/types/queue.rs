use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::http::Request;

/// A request deferred because connectivity was absent.
///
/// Holds the logical (pre-encryption) request so a replay re-runs the merge
/// step against the cache as it is at replay time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    /// Queue entry id; stable across requeues.
    pub id: Uuid,
    pub request: Request,
    pub enqueued_at: DateTime<Utc>,
    pub attempts_so_far: u32,
}

impl QueuedRequest {
    pub fn new(request: Request) -> Self {
        Self { id: Uuid::now_v7(), request, enqueued_at: Utc::now(), attempts_so_far: 0 }
    }

    /// Same entry with one more recorded attempt.
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        Self { attempts_so_far: self.attempts_so_far.saturating_add(1), ..self.clone() }
    }
}
