//! Stub implementations of the external collaborator traits.
//!
//! # TEST ONLY
//!
//! These back the unit tests, the integration tests and the CLI simulator.
//! Each supports failure injection so the "log and discard" paths can be
//! exercised deterministically.

mod auth_gateway_stub;
mod channel_stubs;
mod progress_store_stub;

pub use auth_gateway_stub::StubAuthGateway;
pub use channel_stubs::{InMemoryIdentityStore, InMemoryMigrationChannel, InMemoryRecoveryChannel};
pub use progress_store_stub::InMemoryProgressStore;
