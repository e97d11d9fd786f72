//! Injectable time source.
//!
//! Session scoping by calendar date and record timestamps both depend on the
//! wall clock, so the clock is a capability handed through [`crate::state::AppState`]
//! rather than read ambiently. Tests substitute [`FixedClock`] for deterministic
//! dates and timestamps.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date used for session scoping. Derived from `now()`.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock returning a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to a new instant. Subsequent `now()` calls return it.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("FixedClock lock poisoned") = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("FixedClock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_returns_and_advances() {
        let t1 = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2026, 3, 3, 9, 30, 0).unwrap();
        let clock = FixedClock::new(t1);
        assert_eq!(clock.now(), t1);
        assert_eq!(clock.today(), t1.date_naive());
        clock.set(t2);
        assert_eq!(clock.today(), t2.date_naive());
    }
}
