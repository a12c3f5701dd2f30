//! Seams to external collaborators.
//!
//! The engine never talks to a concrete provider; every external system is
//! reached through one of these traits. In-memory implementations live in
//! [`crate::stubs`].

mod auth_gateway;
mod channels;
mod progress_store;

pub use auth_gateway::AuthGateway;
pub use channels::{LocalIdentityStore, MigrationChannel, RecoveryChannel};
pub use progress_store::RemoteProgressStore;
