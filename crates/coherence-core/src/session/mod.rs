//! Session orchestration.
//!
//! A [`CoherenceSession`] is created explicitly per client session and
//! shared by `Arc`. It owns:
//!
//! - the [`crate::coherence::CoherenceEngine`] behind a short, never-awaited lock
//! - the [`crate::sync::SyncCoordinator`]
//! - a [`TimerSet`] with one task per [`TimerPurpose`]
//! - a broadcast channel of [`crate::coherence::EngineEvent`]
//!
//! # Example
//!
//! ```ignore
//! let session = CoherenceSession::new(Config::default_config(), deps)?;
//! let established = session.establish().await?;
//! let mut events = session.subscribe();
//! // ...
//! session.on_visibility_change(false).await;
//! session.shutdown().await;
//! ```

mod coherence_session;
mod single_flight;
mod timers;

pub use coherence_session::{CoherenceSession, Established, SessionDeps};
pub use single_flight::SingleFlight;
pub use timers::{TimerPurpose, TimerSet};
