//! Domain types shared by the engine, the identity layer and the sync layer.

mod identity;
mod record;
mod state;

pub use identity::{CredentialKind, Principal, Role, VisitorIdentity};
pub use record::{
    clamp_score, Collection, IdentityLink, MigrationPayload, ProgressPatch, ProgressRecord,
    RecordKey, RecoveryGrant, SyncCursor,
};
pub use state::{CoherenceState, StateTransition};
