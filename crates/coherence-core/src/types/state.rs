//! Coherence state labels.
//!
//! The label is a pure function of the score. Boundaries are closed on the
//! lower edge and there is no hysteresis:
//!
//! - **STABLE**: 90 <= s <= 100
//! - **RECOVERING**: 70 <= s < 90
//! - **FRAYING**: 45 <= s < 70
//! - **FRAGMENTED**: 20 <= s < 45
//! - **CRITICAL**: 0 <= s < 20

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::constants::thresholds;

/// Narrative coherence state derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoherenceState {
    Critical,
    Fragmented,
    Fraying,
    Recovering,
    Stable,
}

impl CoherenceState {
    /// All states, lowest first.
    pub const ALL: [CoherenceState; 5] = [
        Self::Critical,
        Self::Fragmented,
        Self::Fraying,
        Self::Recovering,
        Self::Stable,
    ];

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Fragmented => "FRAGMENTED",
            Self::Fraying => "FRAYING",
            Self::Recovering => "RECOVERING",
            Self::Stable => "STABLE",
        }
    }

    /// Get 3-character code for compact status lines.
    #[inline]
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Critical => "CRT",
            Self::Fragmented => "FRG",
            Self::Fraying => "FRY",
            Self::Recovering => "REC",
            Self::Stable => "STB",
        }
    }

    /// Determine state from a coherence score.
    ///
    /// Scores outside [0, 100] are clamped first; NaN maps to CRITICAL.
    pub fn from_score(score: f64) -> Self {
        let s = if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) };
        match s {
            s if s >= thresholds::STABLE => Self::Stable,
            s if s >= thresholds::RECOVERING => Self::Recovering,
            s if s >= thresholds::FRAYING => Self::Fraying,
            s if s >= thresholds::FRAGMENTED => Self::Fragmented,
            _ => Self::Critical,
        }
    }

    /// Whether moving from `self` to `to` is an improvement.
    pub fn is_recovery_to(&self, to: CoherenceState) -> bool {
        to > *self
    }
}

impl std::fmt::Display for CoherenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// State transition with timestamp and context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: CoherenceState,
    pub to: CoherenceState,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_score_boundaries() {
        let test_cases = [
            (0.0, CoherenceState::Critical),
            (19.99, CoherenceState::Critical),
            (20.0, CoherenceState::Fragmented),
            (44.99, CoherenceState::Fragmented),
            (45.0, CoherenceState::Fraying),
            (69.99, CoherenceState::Fraying),
            (70.0, CoherenceState::Recovering),
            (89.99, CoherenceState::Recovering),
            (90.0, CoherenceState::Stable),
            (100.0, CoherenceState::Stable),
        ];

        for (score, expected) in test_cases {
            let actual = CoherenceState::from_score(score);
            assert_eq!(actual, expected, "from_score({}) must return {:?}", score, expected);
        }
    }

    #[test]
    fn test_every_integer_score_maps_to_exactly_one_bucket() {
        for s in 0..=100 {
            let score = s as f64;
            let matching: Vec<_> = CoherenceState::ALL
                .iter()
                .filter(|state| {
                    let (lo, hi) = match state {
                        CoherenceState::Critical => (0.0, 20.0),
                        CoherenceState::Fragmented => (20.0, 45.0),
                        CoherenceState::Fraying => (45.0, 70.0),
                        CoherenceState::Recovering => (70.0, 90.0),
                        CoherenceState::Stable => (90.0, 100.1),
                    };
                    score >= lo && score < hi
                })
                .collect();
            assert_eq!(matching.len(), 1, "score {} matched {:?}", s, matching);
            assert_eq!(*matching[0], CoherenceState::from_score(score));
        }
    }

    #[test]
    fn test_out_of_range_scores_clamp() {
        assert_eq!(CoherenceState::from_score(-5.0), CoherenceState::Critical);
        assert_eq!(CoherenceState::from_score(140.0), CoherenceState::Stable);
        assert_eq!(CoherenceState::from_score(f64::NAN), CoherenceState::Critical);
    }

    #[test]
    fn test_short_name_length_exactly_3() {
        for state in CoherenceState::ALL {
            assert_eq!(state.short_name().len(), 3, "{:?}", state);
        }
    }

    #[test]
    fn test_ordering_and_recovery() {
        assert!(CoherenceState::Stable > CoherenceState::Critical);
        assert!(CoherenceState::Fraying.is_recovery_to(CoherenceState::Recovering));
        assert!(!CoherenceState::Stable.is_recovery_to(CoherenceState::Fraying));
    }

    #[test]
    fn test_serde_uses_label_names() {
        let json = serde_json::to_string(&CoherenceState::Fragmented).unwrap();
        assert_eq!(json, "\"FRAGMENTED\"");
        let back: CoherenceState = serde_json::from_str("\"RECOVERING\"").unwrap();
        assert_eq!(back, CoherenceState::Recovering);
    }
}
