//! Sync triggers and the policies that gate the polled ones.
//!
//! Event-driven triggers (visibility loss, unload, initial, teardown,
//! override) always flush. The two polled triggers compare the current
//! snapshot with the [`SyncCursor`]:
//!
//! - **StateTransition**: label differs from the last synced label
//! - **Backup**: `since_last_sync > min_interval` AND
//!   (`|score delta| > threshold` OR day changed)

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::types::{CoherenceState, ProgressRecord, SyncCursor};

/// Why a flush was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// Client became hidden.
    VisibilityLoss,
    /// Client is going away. Best-effort.
    Unload,
    /// Label changed since the last sync (polled).
    StateTransition,
    /// Periodic backup (polled).
    Backup,
    /// Short delay after session establishment.
    Initial,
    /// Session teardown.
    Teardown,
    /// Privileged score/day override.
    Override,
}

impl SyncTrigger {
    pub fn name(&self) -> &'static str {
        match self {
            Self::VisibilityLoss => "visibility_loss",
            Self::Unload => "unload",
            Self::StateTransition => "state_transition",
            Self::Backup => "backup",
            Self::Initial => "initial",
            Self::Teardown => "teardown",
            Self::Override => "override",
        }
    }

    /// Polled triggers consult a policy; the rest flush unconditionally.
    pub fn is_polled(&self) -> bool {
        matches!(self, Self::StateTransition | Self::Backup)
    }
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Decision about whether to flush now.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushDecision {
    Flush(SyncTrigger),
    Skip(SkipReason),
}

impl FlushDecision {
    pub fn should_flush(&self) -> bool {
        matches!(self, Self::Flush(_))
    }
}

/// Reason a polled trigger declined to flush.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Label unchanged since the last sync.
    StateUnchanged { state: CoherenceState },
    /// Last sync too recent for a backup.
    TooSoon { since: Duration, required: Duration },
    /// Not enough drift to justify a backup.
    InsufficientChange { score_delta: f64, threshold: f64 },
}

/// Label-change poll.
pub fn evaluate_transition(cursor: &SyncCursor, snapshot: &ProgressRecord) -> FlushDecision {
    if snapshot.coherence_state != cursor.state {
        FlushDecision::Flush(SyncTrigger::StateTransition)
    } else {
        FlushDecision::Skip(SkipReason::StateUnchanged {
            state: cursor.state,
        })
    }
}

/// Backup poll. Both bounds are strict.
pub fn evaluate_backup(
    cursor: &SyncCursor,
    snapshot: &ProgressRecord,
    now: DateTime<Utc>,
    config: &SyncConfig,
) -> FlushDecision {
    let since = (now - cursor.at).to_std().unwrap_or(Duration::ZERO);
    let required = Duration::from_millis(config.backup_min_interval_ms);
    if since <= required {
        return FlushDecision::Skip(SkipReason::TooSoon { since, required });
    }

    let score_delta = (snapshot.coherence_score - cursor.score).abs();
    let day_changed = snapshot.day_progress != cursor.day;
    if score_delta > config.backup_score_delta || day_changed {
        FlushDecision::Flush(SyncTrigger::Backup)
    } else {
        FlushDecision::Skip(SkipReason::InsufficientChange {
            score_delta,
            threshold: config.backup_score_delta,
        })
    }
}
