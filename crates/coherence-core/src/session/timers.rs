//! TimerSet: every background task of a session, keyed by purpose.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// What a timer task is for. At most one task per purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    Recovery,
    Rollover,
    TransitionPoll,
    BackupPoll,
    InitialSync,
}

impl TimerPurpose {
    pub const ALL: [TimerPurpose; 5] = [
        Self::Recovery,
        Self::Rollover,
        Self::TransitionPoll,
        Self::BackupPoll,
        Self::InitialSync,
    ];
}

/// Owns timer task handles. Arming a purpose replaces (aborts) its previous
/// task; [`TimerSet::abort_all`] stops everything deterministically.
#[derive(Debug, Default)]
pub struct TimerSet {
    handles: Mutex<HashMap<TimerPurpose, JoinHandle<()>>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, purpose: TimerPurpose, handle: JoinHandle<()>) {
        if let Some(previous) = self.handles.lock().insert(purpose, handle) {
            previous.abort();
        }
        debug!(?purpose, "timer armed");
    }

    pub fn cancel(&self, purpose: TimerPurpose) {
        if let Some(handle) = self.handles.lock().remove(&purpose) {
            handle.abort();
        }
    }

    /// Armed and still running.
    pub fn is_armed(&self, purpose: TimerPurpose) -> bool {
        self.handles
            .lock()
            .get(&purpose)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn armed_count(&self) -> usize {
        self.handles
            .lock()
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub fn abort_all(&self) {
        let drained: Vec<_> = self.handles.lock().drain().collect();
        for (purpose, handle) in drained {
            handle.abort();
            debug!(?purpose, "timer aborted");
        }
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        for (_, handle) in self.handles.get_mut().drain() {
            handle.abort();
        }
    }
}
