//! RolloverScheduler - when the next day boundary falls.
//!
//! The boundary is the time-of-day of `start_date`, every day. The session
//! arms a one-shot timer from [`RolloverScheduler::schedule`] and re-arms
//! after each firing from the unchanged origin.
//!
//! Firing is advisory. If the timer is late, skipped or doubled, the next
//! `load` re-derives the day from the origin anyway.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};

/// Computes rollover boundaries from a temporal origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloverScheduler {
    time_of_day: NaiveTime,
}

impl RolloverScheduler {
    /// Scheduler anchored on the time-of-day of `start_date`.
    pub fn from_origin(start_date: DateTime<Utc>) -> Self {
        Self {
            time_of_day: start_date.time(),
        }
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.time_of_day
    }

    /// Next boundary strictly after `now`: today if still ahead, else tomorrow.
    pub fn next_boundary(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.time_of_day).and_utc();
        if today > now {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }

    /// Next boundary strictly after `after`, and the delay from `now` until
    /// it for the one-shot rollover timer.
    ///
    /// Passing the last fired boundary as `after` keeps a timer that woke
    /// early from firing the same boundary twice.
    pub fn schedule(&self, after: DateTime<Utc>, now: DateTime<Utc>) -> (DateTime<Utc>, Duration) {
        let boundary = self.next_boundary(after.max(now));
        let delay = (boundary - now).to_std().unwrap_or(Duration::ZERO);
        (boundary, delay)
    }
}
