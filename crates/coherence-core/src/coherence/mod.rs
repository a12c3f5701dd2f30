//! Coherence engine: decaying score, state label and day progress.
//!
//! # Score dynamics
//!
//! - **Decay** on load: `max(0, score - floor(elapsed / window) * rate)`
//! - **Recovery** on a fixed tick: `min(100, score + step)`
//! - **Rollover** on the day boundary: one-time bonus plus one day
//!
//! The label is recomputed from the score after every mutation.
//!
//! # Day progress
//!
//! `start_date` is the single source of truth. A stored day ahead of the
//! derived one moves the origin back instead of living in a separate flag.

pub mod decay;
mod engine;
mod events;


pub use engine::{CoherenceEngine, LoadOutcome, RolloverOutcome};
pub use events::EngineEvent;
