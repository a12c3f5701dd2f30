//! Identity layer: local visitor identity, anchoring and recovery codes.

mod anchor;
mod file_store;
pub mod recovery_code;
mod session;

pub use anchor::{CollisionResolution, IdentityAnchor, Reconciliation};
pub use file_store::FileIdentityStore;
pub use session::IdentitySession;
