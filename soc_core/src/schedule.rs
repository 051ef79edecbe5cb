//! Timer bookkeeping for the driver: periodic tick, telemetry poll and the
//! once-a-day deep refresh.
//!
//! Everything here is a pure function of "now" so the driver's behavior can
//! be stepped deterministically; the driver thread only decides how long to
//! wait between steps.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use rand::Rng;
use soc_traits::clock::hours_between;
use std::time::Duration;

use crate::config::{DeepRefreshCfg, ScheduleCfg};
use crate::state::EstimationState;

/// Daily `(hour, minute)` in UTC at which the deep refresh may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSlot {
    pub hour: u32,
    pub minute: u32,
}

impl RefreshSlot {
    /// Use the pinned slot if configured, else draw one uniformly from the
    /// window. Drawn once per process so a fleet of installations does not
    /// hit the API at the same minute.
    pub fn pick<R: Rng>(cfg: &DeepRefreshCfg, rng: &mut R) -> Self {
        if let Some((hour, minute)) = cfg.fixed_slot {
            return Self {
                hour: hour.min(23),
                minute: minute.min(59),
            };
        }
        let start = cfg.window_start_hour.min(23);
        let end = cfg.window_end_hour.clamp(start, 23);
        Self {
            hour: rng.random_range(start..=end),
            minute: rng.random_range(0..=59),
        }
    }

    /// First occurrence of the slot strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let day = ChronoDuration::days(1);
        let Some(at) = NaiveTime::from_hms_opt(self.hour, self.minute, 0) else {
            return deadline(now, day);
        };
        let today = now.date_naive().and_time(at).and_utc();
        if today > now {
            today
        } else {
            deadline(today, day)
        }
    }
}

/// Whether the daily deep refresh should actually wake the vehicle.
///
/// Only when a baseline exists and it is at least `min_hours_since_update`
/// old: a vehicle that was driven or charged recently reported on its own.
pub fn should_deep_refresh(
    state: &EstimationState,
    now: DateTime<Utc>,
    min_hours_since_update: f64,
) -> bool {
    let Some(since) = state.last_actual_soc_time() else {
        return false;
    };
    hours_between(since, now) >= min_hours_since_update
}

/// Which timers are due at a given instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Due {
    pub poll: bool,
    pub tick: bool,
    pub deep_refresh: bool,
}

/// Next fire time of each timer.
#[derive(Debug, Clone)]
pub struct Timers {
    poll_every: ChronoDuration,
    tick_every: ChronoDuration,
    slot: RefreshSlot,
    next_poll: DateTime<Utc>,
    next_tick: DateTime<Utc>,
    next_refresh: DateTime<Utc>,
}

fn to_chrono(d: Duration) -> ChronoDuration {
    ChronoDuration::from_std(d)
        .unwrap_or(ChronoDuration::MAX)
        .max(ChronoDuration::milliseconds(1))
}

/// `at + every`, saturating at the end of representable time.
fn deadline(at: DateTime<Utc>, every: ChronoDuration) -> DateTime<Utc> {
    at.checked_add_signed(every).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Timers {
    /// Poll immediately, first tick one period from `start`.
    pub fn new(cfg: &ScheduleCfg, slot: RefreshSlot, start: DateTime<Utc>) -> Self {
        let tick_every = to_chrono(cfg.tick);
        Self {
            poll_every: to_chrono(cfg.poll),
            tick_every,
            slot,
            next_poll: start,
            next_tick: deadline(start, tick_every),
            next_refresh: slot.next_after(start),
        }
    }

    pub fn slot(&self) -> RefreshSlot {
        self.slot
    }

    /// Report due timers and re-arm them relative to `now`.
    pub fn fire(&mut self, now: DateTime<Utc>) -> Due {
        let mut due = Due::default();
        if now >= self.next_poll {
            due.poll = true;
            self.next_poll = deadline(now, self.poll_every);
        }
        if now >= self.next_tick {
            due.tick = true;
            self.next_tick = deadline(now, self.tick_every);
        }
        if now >= self.next_refresh {
            due.deep_refresh = true;
            self.next_refresh = self.slot.next_after(now);
        }
        due
    }

    /// Earliest pending fire time.
    pub fn next_wakeup(&self) -> DateTime<Utc> {
        self.next_poll.min(self.next_tick).min(self.next_refresh)
    }

    /// Real time to wait from `now` until the next timer, zero if overdue.
    pub fn wait_from(&self, now: DateTime<Utc>) -> Duration {
        (self.next_wakeup() - now).to_std().unwrap_or(Duration::ZERO)
    }
}
