use serde::{Deserialize, Serialize};

use crate::impl_label_conversions;

/// Network reachability snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Available,
    Unavailable,
}

impl_label_conversions!(ConnectivityState {
    Available => "available",
    Unavailable => "unavailable",
});

impl ConnectivityState {
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    pub const fn from_reachable(reachable: bool) -> Self {
        if reachable {
            Self::Available
        } else {
            Self::Unavailable
        }
    }
}

/// Handle returned by a connectivity subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);
