//! Events broadcast by a coherence session.

use serde::Serialize;

use crate::sync::SyncTrigger;
use crate::types::{CoherenceState, StateTransition};

/// Observable change in a session. Subscribers that lag simply miss events;
/// nothing in the engine depends on delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Score crossed a label boundary.
    StateChanged(StateTransition),
    /// Rollover advanced the day.
    DayAdvanced { day: u32, bonus_applied: f64 },
    /// Remote mapping overrode the local visitor identity.
    IdentityReplaced {
        previous_visitor_id: String,
        visitor_id: String,
    },
    /// Stored anchoring disagreed with the principal and was corrected.
    AnchorHealed { is_anchored: bool },
    /// Snapshot written to the remote store.
    Flushed {
        trigger: SyncTrigger,
        score: f64,
        state: CoherenceState,
        day: u32,
    },
    /// Flush abandoned. Not retried.
    FlushFailed { trigger: SyncTrigger, error: String },
}
