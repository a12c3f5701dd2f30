//! Coherence Core Library
//!
//! Client-resident engine that keeps a decaying "coherence" score and a
//! calendar-driven day counter, reconciles a durable pseudonymous identity
//! with a volatile authentication principal, and decides when to flush
//! state to a remote store.
//!
//! # Architecture
//!
//! This crate defines:
//! - Domain types (`ProgressRecord`, `Principal`, `VisitorIdentity`, etc.)
//! - Collaborator traits (`RemoteProgressStore`, `AuthGateway`, etc.)
//! - The engine, the identity layer, the rollover scheduler and the sync
//!   coordinator
//! - `CoherenceSession`, which wires them together with timers
//! - Error types, configuration and in-memory stubs
//!
//! # Example
//!
//! ```
//! use coherence_core::coherence::decay;
//! use coherence_core::types::CoherenceState;
//!
//! assert_eq!(decay::apply_decay(80.0, 1, 5.0), 75.0);
//! assert_eq!(CoherenceState::from_score(75.0), CoherenceState::Recovering);
//! ```

pub mod clock;
pub mod coherence;
pub mod config;
pub mod error;
pub mod identity;
pub mod rollover;
pub mod session;
pub mod stubs;
pub mod sync;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use clock::{Clock, MockClock, SystemClock, TokioClock};
pub use coherence::{CoherenceEngine, EngineEvent};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use session::{CoherenceSession, Established, SessionDeps};
