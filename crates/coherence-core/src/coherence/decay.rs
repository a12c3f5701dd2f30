//! Pure decay and day-progress math.
//!
//! Everything here is a function of its arguments so the engine's load path
//! stays idempotent: calling it twice with the same inputs yields the same
//! outputs regardless of whether any timer fired in between.

use chrono::{DateTime, Duration, Utc};

use crate::config::EngineConfig;
use crate::types::Principal;

/// Whole decay windows elapsed between `last_seen_at` and `now`.
///
/// Negative elapsed time (client behind server) counts as zero.
pub fn decay_units(last_seen_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> i64 {
    let window_ms = window.num_milliseconds();
    if window_ms <= 0 {
        return 0;
    }
    let elapsed_ms = (now - last_seen_at).num_milliseconds();
    if elapsed_ms <= 0 {
        return 0;
    }
    elapsed_ms / window_ms
}

/// Points lost per decay unit. Admins never decay; anchored identities
/// decay at the lower rate.
pub fn decay_rate(principal: &Principal, config: &EngineConfig) -> f64 {
    if principal.is_admin() {
        0.0
    } else if principal.is_anchored() {
        config.anchored_decay_rate
    } else {
        config.default_decay_rate
    }
}

/// `max(0, score - units * rate)`.
pub fn apply_decay(score: f64, units: i64, rate: f64) -> f64 {
    (score - units as f64 * rate).max(0.0)
}

/// Day derived from UTC-midnight boundaries between the origin and `now`.
///
/// `floor((midnight(now) - midnight(start)) / 1 day) + 1`, never below 1.
pub fn calculated_day(start_date: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days = (now.date_naive() - start_date.date_naive()).num_days();
    if days < 0 {
        1
    } else {
        u32::try_from(days + 1).unwrap_or(u32::MAX)
    }
}

/// Origin that makes [`calculated_day`] return `day` at `now`.
///
/// Shifts by whole days so the origin's time-of-day (and therefore the
/// rollover schedule) is preserved. A shift outside the representable date
/// range leaves `start_date` unchanged.
pub fn origin_for_day(start_date: DateTime<Utc>, now: DateTime<Utc>, day: u32) -> DateTime<Utc> {
    let current = calculated_day(start_date, now) as i64;
    let target = day.max(1) as i64;
    let Some(shifted) = start_date.checked_add_signed(Duration::days(current - target)) else {
        return start_date;
    };
    // A start in the future pins calculated_day at 1; re-anchor on today.
    if shifted.date_naive() > now.date_naive() {
        now.date_naive()
            .checked_sub_signed(Duration::days(target - 1))
            .map(|today| today.and_time(start_date.time()).and_utc())
            .unwrap_or(start_date)
    } else {
        shifted
    }
}

/// Day ceiling for this principal, `None` when uncapped.
pub fn day_cap(principal: &Principal, config: &EngineConfig) -> Option<u32> {
    if principal.is_admin() || principal.is_anchored() {
        None
    } else {
        Some(config.unanchored_day_cap)
    }
}
