//! CoherenceEngine: score, label and day progress for one identity.
//!
//! The engine is plain synchronous state. The session wraps it in a
//! `parking_lot::Mutex` and never holds that lock across an await, so all
//! mutations form one logical sequence.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::decay;
use crate::config::constants::engine::MAX_DAY;
use crate::config::{EngineConfig, RolloverConfig};
use crate::error::{CoreError, CoreResult};
use crate::types::{
    clamp_score, CoherenceState, Principal, ProgressPatch, ProgressRecord, StateTransition,
};

/// What `load` changed. Drives logging, events and the anchoring heal.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub decay_units: i64,
    pub score_before: f64,
    pub score: f64,
    pub state: CoherenceState,
    /// Day derived from the origin before precedence and capping.
    pub calculated_day: u32,
    pub day: u32,
    /// Stored day exceeded the derived day and the origin moved back.
    pub origin_shifted: bool,
    pub day_capped: bool,
    /// Partial update to persist when stored anchoring was wrong.
    pub anchor_patch: Option<ProgressPatch>,
    pub transition: Option<StateTransition>,
}

/// Result of a rollover firing.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloverOutcome {
    pub day: u32,
    pub bonus_applied: f64,
    pub transition: Option<StateTransition>,
}

/// Holds score, label and day for the active identity.
#[derive(Debug)]
pub struct CoherenceEngine {
    config: EngineConfig,
    rollover: RolloverConfig,
    record: ProgressRecord,
    principal: Option<Principal>,
    transition_until: Option<DateTime<Utc>>,
}

impl CoherenceEngine {
    /// Engine holding a fresh record until the first `load`.
    pub fn new(config: EngineConfig, rollover: RolloverConfig, now: DateTime<Utc>) -> Self {
        let record = ProgressRecord::new(now, config.initial_score);
        Self {
            config,
            rollover,
            record,
            principal: None,
            transition_until: None,
        }
    }

    /// Replace in-memory state with `record`, applying decay for the time
    /// since it was last seen, deriving the day from its origin and
    /// re-deriving anchoring from `principal`.
    ///
    /// Pure in its inputs: loading the same record twice at the same `now`
    /// yields the same state.
    pub fn load(
        &mut self,
        mut record: ProgressRecord,
        principal: Principal,
        now: DateTime<Utc>,
    ) -> LoadOutcome {
        let previous_state = self.is_loaded().then_some(self.record.coherence_state);

        let units = decay::decay_units(record.last_seen_at, now, self.config.decay_window());
        let rate = decay::decay_rate(&principal, &self.config);
        let score_before = clamp_score(record.coherence_score);
        let score = clamp_score(decay::apply_decay(score_before, units, rate));

        let calculated_day = decay::calculated_day(record.start_date, now);
        if record.day_progress > MAX_DAY {
            warn!(stored = record.day_progress, max = MAX_DAY, "Stored day out of range; clamped");
        }
        let stored_day = record.day_progress.clamp(1, MAX_DAY);
        let origin_shifted = stored_day > calculated_day;
        let mut day = if origin_shifted {
            record.start_date = decay::origin_for_day(record.start_date, now, stored_day);
            stored_day
        } else {
            calculated_day
        };
        let mut day_capped = false;
        if let Some(cap) = decay::day_cap(&principal, &self.config) {
            if day > cap {
                day = cap;
                day_capped = true;
            }
        }

        let anchored = principal.is_anchored();
        let anchored_uid = anchored.then(|| principal.uid.clone());
        let anchor_patch = (record.is_anchored != anchored
            || record.anchored_principal_uid != anchored_uid)
            .then(|| ProgressPatch::anchoring(anchored, anchored_uid.clone()));

        record.coherence_score = score;
        record.coherence_state = CoherenceState::from_score(score);
        record.day_progress = day;
        record.last_seen_at = now;
        record.is_anchored = anchored;
        record.anchored_principal_uid = anchored_uid;

        let state = record.coherence_state;
        self.record = record;
        self.principal = Some(principal);
        let transition = previous_state.and_then(|from| self.note_transition(from, now));

        if units > 0 {
            debug!(units, rate, score_before, score, "decay applied on load");
        }
        if origin_shifted {
            info!(
                stored_day,
                calculated_day,
                start_date = %self.record.start_date,
                "Stored day ahead of origin; origin shifted"
            );
        }

        LoadOutcome {
            decay_units: units,
            score_before,
            score,
            state,
            calculated_day,
            day,
            origin_shifted,
            day_capped,
            anchor_patch,
            transition,
        }
    }

    /// Passive recovery tick. No catch-up: one tick, one step.
    pub fn recovery_tick(&mut self, now: DateTime<Utc>) -> Option<StateTransition> {
        let step = if self.is_anchored() {
            self.config.anchored_recovery_step
        } else {
            self.config.default_recovery_step
        };
        self.set_score_internal(self.record.coherence_score + step, now)
    }

    /// Privileged score override.
    pub fn set_score(&mut self, score: f64, now: DateTime<Utc>) -> Option<StateTransition> {
        info!(score, "Score override");
        self.set_score_internal(score, now)
    }

    /// Privileged day override. Rewrites the origin so derivation yields `day`.
    ///
    /// # Errors
    /// `ValidationError` if `day` is 0 or above [`MAX_DAY`].
    pub fn set_current_day(&mut self, day: u32, now: DateTime<Utc>) -> CoreResult<()> {
        if day == 0 {
            return Err(CoreError::validation("day", "day must be at least 1"));
        }
        if day > MAX_DAY {
            return Err(CoreError::validation(
                "day",
                format!("day must be at most {}", MAX_DAY),
            ));
        }
        self.record.start_date = decay::origin_for_day(self.record.start_date, now, day);
        self.record.day_progress = day;
        info!(day, start_date = %self.record.start_date, "Day override");
        Ok(())
    }

    /// Day boundary reached: one-time bonus, +1 day (capped), raise the
    /// transition signal. The origin is left alone.
    pub fn apply_rollover(&mut self, now: DateTime<Utc>) -> RolloverOutcome {
        let before = self.record.coherence_score;
        let transition = self.set_score_internal(before + self.rollover.day_bonus, now);
        let bonus_applied = self.record.coherence_score - before;

        let mut day = self.record.day_progress.saturating_add(1).min(MAX_DAY);
        if let Some(cap) = self.day_cap() {
            day = day.min(cap);
        }
        self.record.day_progress = day;
        self.transition_until = Some(now + self.rollover.transition_signal());

        info!(day, bonus_applied, "Day rollover");
        RolloverOutcome {
            day,
            bonus_applied,
            transition,
        }
    }

    /// Record a narrative fragment as seen.
    ///
    /// # Returns
    /// `true` if it had not been seen before.
    pub fn mark_fragment_seen(&mut self, fragment_id: &str) -> bool {
        self.record.seen_fragments.insert(fragment_id.to_string())
    }

    pub fn set_access_code(&mut self, code: Option<String>) {
        self.record.access_code = code;
    }

    /// Full record reflecting in-memory state.
    pub fn snapshot(&self) -> ProgressRecord {
        self.record.clone()
    }

    /// Whether the day-transition signal is still raised.
    pub fn is_transitioning(&self, now: DateTime<Utc>) -> bool {
        self.transition_until.map(|until| now < until).unwrap_or(false)
    }

    pub fn score(&self) -> f64 {
        self.record.coherence_score
    }

    pub fn state(&self) -> CoherenceState {
        self.record.coherence_state
    }

    pub fn day(&self) -> u32 {
        self.record.day_progress
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.record.start_date
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.principal.is_some()
    }

    pub fn is_anchored(&self) -> bool {
        self.principal
            .as_ref()
            .map(Principal::is_anchored)
            .unwrap_or(false)
    }

    fn day_cap(&self) -> Option<u32> {
        match &self.principal {
            Some(p) => decay::day_cap(p, &self.config),
            None => Some(self.config.unanchored_day_cap),
        }
    }

    fn set_score_internal(&mut self, score: f64, now: DateTime<Utc>) -> Option<StateTransition> {
        let previous = self.record.coherence_state;
        self.record.coherence_score = clamp_score(score);
        self.record.coherence_state = CoherenceState::from_score(self.record.coherence_score);
        self.note_transition(previous, now)
    }

    fn note_transition(
        &self,
        from: CoherenceState,
        now: DateTime<Utc>,
    ) -> Option<StateTransition> {
        let to = self.record.coherence_state;
        if from == to {
            return None;
        }
        let transition = StateTransition {
            from,
            to,
            timestamp: now,
            score: self.record.coherence_score,
        };
        info!(
            "State transition: {} -> {} (score={:.1})",
            from.name(),
            to.name(),
            transition.score
        );
        Some(transition)
    }
}
