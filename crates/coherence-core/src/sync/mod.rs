//! Remote sync: triggers, flush policies and the coordinator.

mod coordinator;
mod triggers;

pub use coordinator::SyncCoordinator;
pub use triggers::{evaluate_backup, evaluate_transition, FlushDecision, SkipReason, SyncTrigger};
