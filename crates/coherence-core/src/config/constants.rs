//! Centralized constants for the coherence engine.
//!
//! Every tunable has a named constant here and a matching field in
//! [`super::Config`]; the config defaults read from these.

/// State-label thresholds. Lower edge closed.
///
/// ```text
/// STABLE      s ∈ [90, 100]
/// RECOVERING  s ∈ [70, 90)
/// FRAYING     s ∈ [45, 70)
/// FRAGMENTED  s ∈ [20, 45)
/// CRITICAL    s ∈ [0, 20)
/// ```
pub mod thresholds {
    pub const STABLE: f64 = 90.0;
    pub const RECOVERING: f64 = 70.0;
    pub const FRAYING: f64 = 45.0;
    pub const FRAGMENTED: f64 = 20.0;
}

/// Score, decay and recovery constants.
pub mod engine {
    pub const MIN_SCORE: f64 = 0.0;
    pub const MAX_SCORE: f64 = 100.0;

    /// Score given to a record created for a new identity.
    pub const INITIAL_SCORE: f64 = 100.0;

    /// Length of one decay unit (6 hours).
    pub const DECAY_WINDOW_SECS: u64 = 6 * 60 * 60;

    /// Points lost per decay unit for unanchored identities.
    pub const DEFAULT_DECAY_RATE: f64 = 5.0;

    /// Points lost per decay unit for anchored identities. Must stay below
    /// `DEFAULT_DECAY_RATE`.
    pub const ANCHORED_DECAY_RATE: f64 = 3.0;

    /// Passive recovery tick interval.
    pub const RECOVERY_INTERVAL_MS: u64 = 5_000;

    /// Points recovered per tick.
    pub const DEFAULT_RECOVERY_STEP: f64 = 0.5;

    /// Points recovered per tick when anchored.
    pub const ANCHORED_RECOVERY_STEP: f64 = 1.0;

    /// Day ceiling for non-admin, non-anchored identities.
    pub const UNANCHORED_DAY_CAP: u32 = 30;

    /// Largest day a record may carry (roughly 270 years). Keeps every
    /// origin shift inside the representable date range.
    pub const MAX_DAY: u32 = 100_000;
}

/// Day rollover constants.
pub mod rollover {
    /// One-time score bonus applied when a day rolls over.
    pub const DAY_BONUS: f64 = 10.0;

    /// How long the transient transition signal stays raised.
    pub const TRANSITION_SIGNAL_MS: u64 = 4_000;
}

/// Sync trigger constants.
pub mod sync {
    /// Delay before the first flush after a session is established.
    pub const INITIAL_SYNC_DELAY_MS: u64 = 2_000;

    /// State-label change poll interval.
    pub const TRANSITION_POLL_MS: u64 = 10_000;

    /// Backup poll interval.
    pub const BACKUP_POLL_MS: u64 = 30_000;

    /// Minimum time since the last sync before a backup flush (2 minutes).
    pub const BACKUP_MIN_INTERVAL_MS: u64 = 120_000;

    /// Minimum absolute score change for a backup flush.
    pub const BACKUP_SCORE_DELTA: f64 = 5.0;
}

/// Local identity and recovery constants.
pub mod identity {
    /// Fixed key of the local identity blob.
    pub const STORAGE_KEY: &str = "coherence.visitor_identity";

    /// Length of human-readable recovery codes.
    pub const RECOVERY_CODE_LENGTH: usize = 8;

    /// Alphabet for recovery codes. No 0/O or 1/I.
    pub const RECOVERY_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

    /// Lifetime of an issued recovery code (7 days).
    pub const RECOVERY_CODE_TTL_SECS: i64 = 7 * 24 * 60 * 60;
}
