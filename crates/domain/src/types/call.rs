use serde::{Deserialize, Serialize};

use crate::impl_label_conversions;

/// Per-call pipeline state.
///
/// ```text
/// Building -> AwaitingConnectivity -> Queued
///          \                      \-> Sending
///           \-> Sending -> Retrying -> Sending (backoff)
///                                  \-> Completed
///                                  \-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Building,
    AwaitingConnectivity,
    Sending,
    Retrying,
    Completed,
    Queued,
    Failed,
}

impl_label_conversions!(CallState {
    Building => "building",
    AwaitingConnectivity => "awaiting_connectivity",
    Sending => "sending",
    Retrying => "retrying",
    Completed => "completed",
    Queued => "queued",
    Failed => "failed",
});

impl CallState {
    /// Whether `self -> next` is a legal transition.
    ///
    /// `Completed -> Failed` is allowed because decrypting the final body
    /// happens in `Completed` and may still fail.
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Building, Self::AwaitingConnectivity | Self::Sending | Self::Failed)
                | (Self::AwaitingConnectivity, Self::Queued | Self::Sending | Self::Failed)
                | (Self::Sending, Self::Retrying)
                | (Self::Retrying, Self::Sending | Self::Completed | Self::Failed)
                | (Self::Completed, Self::Failed)
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Queued | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `CallState::can_transition_to` behavior for the state
    /// machine scenario.
    ///
    /// Assertions:
    /// - The happy path and offline path are legal.
    /// - Terminal states cannot restart.
    #[test]
    fn test_transitions() {
        assert!(CallState::Building.can_transition_to(CallState::AwaitingConnectivity));
        assert!(CallState::AwaitingConnectivity.can_transition_to(CallState::Queued));
        assert!(CallState::Sending.can_transition_to(CallState::Retrying));
        assert!(CallState::Retrying.can_transition_to(CallState::Sending));
        assert!(CallState::Retrying.can_transition_to(CallState::Completed));

        assert!(!CallState::Queued.can_transition_to(CallState::Sending));
        assert!(!CallState::Failed.can_transition_to(CallState::Building));
        assert!(!CallState::Sending.can_transition_to(CallState::Completed));
        assert!(CallState::Queued.is_terminal());
    }
}
