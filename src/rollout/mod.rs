//! Rollout module — canary serving across two model slots
//!
//! Holds the `current` and `candidate` slots, splits prediction traffic between
//! them, and swaps slot contents while requests are in flight.

pub mod controller;
pub mod router;
pub mod slots;

pub use controller::{PredictionOutcome, RolloutController, RolloutStatus};
pub use router::TrafficRouter;
pub use slots::SlotStore;

use serde::{Deserialize, Serialize};

/// One of the two model slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// The promoted model serving the bulk of traffic
    Current,
    /// The canary model under evaluation
    Candidate,
}

impl Slot {
    /// Both slots, in display order
    pub const ALL: [Slot; 2] = [Slot::Current, Slot::Candidate];

    /// Lowercase slot name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Candidate => "candidate",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
