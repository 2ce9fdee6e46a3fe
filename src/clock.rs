//! Injectable clock and canonical timestamp formatting.
//!
//! Everything the engine schedules is derived from an explicit `now` rather
//! than a hidden `Utc::now()`, so scheduling tests stay deterministic.
//! Timestamps are stored as fixed-width `YYYY-MM-DDTHH:MM:SSZ` text, so
//! SQLite string comparison orders them correctly.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Storage format for timestamps. Fixed-width UTC so text comparison
/// in SQL matches chronological order.
pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Storage format for calendar dates (the `sent_on` ledger column).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a timestamp for storage.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Format a calendar date for storage.
pub fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored timestamp back into a `DateTime<Utc>`.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Clock capability. The service holds a `dyn Clock` so mutation paths
/// (which don't take an explicit `now`) are testable with a fixed time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used everywhere outside tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub mod test_clock {
    use super::*;
    use std::sync::Mutex;

    /// Clock pinned to a settable instant.
    pub struct FixedClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        pub fn at(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.lock().unwrap() = now;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}
