use std::time::Duration;

use uuid::Uuid;

use super::http::{LogicalKey, Response};
use crate::errors::{ErrorKind, InterceptError};

/// Result of `submit` as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Upstream answered 2xx; the body is already decrypted.
    Completed(Response),
    /// No connectivity; the request was queued for replay.
    Deferred { queued_id: Uuid },
    Failed(InterceptError),
}

impl SubmitOutcome {
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }

    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed(err) => Some(err.kind()),
            _ => None,
        }
    }

    pub const fn response(&self) -> Option<&Response> {
        match self {
            Self::Completed(response) => Some(response),
            _ => None,
        }
    }
}

/// Passed to retry listeners before each backoff wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryNotice {
    pub request_id: Uuid,
    pub logical_key: LogicalKey,
    /// Zero-based index of the attempt that just failed.
    pub attempt: u32,
    /// `None` when the attempt failed at the transport level.
    pub status: Option<u16>,
    pub delay: Duration,
}

/// What happened to one queued request during a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayResult {
    Completed(Response),
    /// Failed for a non-connectivity reason; moved to the back of the queue.
    Requeued(InterceptError),
    /// Hit the attempt ceiling; removed. Carries `QueueExhausted`.
    Dropped(InterceptError),
}

/// Delivered through the replay-result hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub queued_id: Uuid,
    pub request_id: Uuid,
    pub logical_key: LogicalKey,
    pub attempts_so_far: u32,
    pub result: ReplayResult,
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub completed: usize,
    pub requeued: usize,
    pub dropped: usize,
    /// The pass stopped early because connectivity went away.
    pub interrupted: bool,
}

impl ReplayReport {
    pub const fn processed(&self) -> usize {
        self.completed + self.requeued + self.dropped
    }
}
