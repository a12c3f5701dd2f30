//! SyncCoordinator: gates and performs snapshot flushes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::triggers::{evaluate_backup, evaluate_transition, FlushDecision, SyncTrigger};
use crate::config::SyncConfig;
use crate::error::CoreResult;
use crate::traits::RemoteProgressStore;
use crate::types::{ProgressRecord, RecordKey, SyncCursor};

/// Decides when to write the engine snapshot and writes it.
///
/// Every flush is a full-snapshot upsert. A failed flush is logged and
/// dropped; the next trigger carries the data instead.
pub struct SyncCoordinator {
    store: Arc<dyn RemoteProgressStore>,
    config: SyncConfig,
    cursor: Mutex<Option<SyncCursor>>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("config", &self.config)
            .field("cursor", &*self.cursor.lock())
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn RemoteProgressStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            cursor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Baseline the cursor on a freshly loaded record.
    pub fn reset(&self, snapshot: &ProgressRecord, at: DateTime<Utc>) {
        *self.cursor.lock() = Some(SyncCursor::from_record(snapshot, at));
    }

    pub fn clear(&self) {
        *self.cursor.lock() = None;
    }

    pub fn cursor(&self) -> Option<SyncCursor> {
        self.cursor.lock().clone()
    }

    /// Gate a trigger. Without a cursor nothing has been synced yet, so
    /// every trigger flushes.
    pub fn evaluate(
        &self,
        trigger: SyncTrigger,
        snapshot: &ProgressRecord,
        now: DateTime<Utc>,
    ) -> FlushDecision {
        let guard = self.cursor.lock();
        let decision = match (trigger, guard.as_ref()) {
            (SyncTrigger::StateTransition, Some(cursor)) => evaluate_transition(cursor, snapshot),
            (SyncTrigger::Backup, Some(cursor)) => {
                evaluate_backup(cursor, snapshot, now, &self.config)
            }
            _ => FlushDecision::Flush(trigger),
        };
        debug!(trigger = %trigger, ?decision, "sync trigger evaluated");
        decision
    }

    /// Write `snapshot` under `key` and advance the cursor.
    ///
    /// # Errors
    /// Store errors are logged at `warn` and returned for reporting only;
    /// the cursor is left untouched and nothing is retried.
    pub async fn flush(
        &self,
        key: &RecordKey,
        snapshot: ProgressRecord,
        trigger: SyncTrigger,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let cursor = SyncCursor::from_record(&snapshot, now);
        match self.store.set(key.collection, &key.id, snapshot).await {
            Ok(()) => {
                debug!(trigger = %trigger, key = %key, score = cursor.score, day = cursor.day, "flushed");
                *self.cursor.lock() = Some(cursor);
                Ok(())
            }
            Err(e) => {
                warn!(trigger = %trigger, key = %key, error = %e, "Flush failed; discarding");
                Err(e)
            }
        }
    }
}
