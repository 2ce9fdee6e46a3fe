//! Schedule parsing and advancement for reminders.
//!
//! Two schedule kinds exist and the set is closed: monthly recurrence for
//! card check-ins and a single absolute instant for goal nudges. Monthly
//! days above 28 clamp to 28 so every computed send date is valid in every
//! month. All functions here are pure; the dispatcher supplies `now`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

use crate::error::ReminderError;

/// Highest schedulable day of month. Clamping to 28 keeps the recurrence
/// valid in February without month-length special cases.
pub const MAX_DAY_OF_MONTH: u32 = 28;

/// A monthly check-in schedule: day of month (1–28) at a fixed time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlySchedule {
    pub day_of_month: u32,
    pub hour: u32,
    pub minute: u32,
}

impl MonthlySchedule {
    /// Parse and validate a monthly schedule.
    ///
    /// Days above 28 clamp; days below 1 are rejected. `time` must be a
    /// 24-hour `HH:MM` literal.
    pub fn parse(day_of_month: i64, time: &str) -> Result<Self, ReminderError> {
        if day_of_month < 1 {
            return Err(ReminderError::InvalidSchedule(format!(
                "day of month must be at least 1, got {day_of_month}"
            )));
        }
        let day = (day_of_month as u32).min(MAX_DAY_OF_MONTH);
        let (hour, minute) = parse_send_time(time)?;
        Ok(Self {
            day_of_month: day,
            hour,
            minute,
        })
    }

    /// The configured time of day as a `NaiveTime`.
    pub fn time_of_day(&self) -> NaiveTime {
        // Always valid: parse_send_time bounds hour/minute.
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or_default()
    }

    /// The stored `HH:MM` form.
    pub fn time_string(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Parse a 24-hour `HH:MM` literal.
fn parse_send_time(time: &str) -> Result<(u32, u32), ReminderError> {
    let invalid = || {
        ReminderError::InvalidSchedule(format!(
            "send time must be a 24-hour HH:MM value, got {time:?}"
        ))
    };
    let (h, m) = time.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// Compute the next monthly send strictly after `after`.
///
/// Candidate is `after`'s own year/month at the scheduled day/time; if that
/// has already passed (or is exactly `after`), advance one calendar month.
/// The day is ≤ 28 so the result always lands on a real date.
pub fn next_monthly_send(after: DateTime<Utc>, schedule: &MonthlySchedule) -> DateTime<Utc> {
    let candidate = monthly_instant(after.year(), after.month(), schedule);
    if candidate > after {
        return candidate;
    }
    let (year, month) = if after.month() == 12 {
        (after.year() + 1, 1)
    } else {
        (after.year(), after.month() + 1)
    };
    monthly_instant(year, month, schedule)
}

fn monthly_instant(year: i32, month: u32, schedule: &MonthlySchedule) -> DateTime<Utc> {
    let day = schedule.day_of_month.min(MAX_DAY_OF_MONTH).max(1);
    // Day ≤ 28 makes this constructible for every month of every year.
    let date = NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default();
    date.and_time(schedule.time_of_day()).and_utc()
}

/// Parse a one-time schedule into an absolute instant.
///
/// Accepts RFC3339 (`2025-06-01T09:00:00Z`, offsets allowed) or a local
/// `YYYY-MM-DDTHH:MM` literal, which is interpreted as UTC. The resolved
/// instant must be strictly after `now`.
pub fn parse_one_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ReminderError> {
    let resolved = if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        ts.with_timezone(&Utc)
    } else if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M") {
        naive.and_utc()
    } else {
        return Err(ReminderError::InvalidSchedule(format!(
            "expected an RFC3339 timestamp or YYYY-MM-DDTHH:MM literal, got {input:?}"
        )));
    };
    if resolved <= now {
        return Err(ReminderError::InvalidSchedule(
            "one-time reminder must be in the future".to_string(),
        ));
    }
    Ok(resolved)
}

/// The closed set of reminder schedule kinds. Adding a third kind is a
/// compile-time-checked change at every match site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderSchedule {
    Monthly(MonthlySchedule),
    OneTime(DateTime<Utc>),
}

impl ReminderSchedule {
    /// First send instant strictly after `now` for a freshly created or
    /// updated reminder.
    pub fn first_send_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            ReminderSchedule::Monthly(monthly) => next_monthly_send(now, monthly),
            ReminderSchedule::OneTime(at) => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_parse_clamps_large_days() {
        for day in [29, 30, 31, 99] {
            let s = MonthlySchedule::parse(day, "09:00").expect("large days clamp, never fail");
            assert_eq!(s.day_of_month, 28);
        }
    }

    #[test]
    fn test_parse_rejects_day_below_one() {
        assert!(MonthlySchedule::parse(0, "09:00").is_err());
        assert!(MonthlySchedule::parse(-3, "09:00").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_time() {
        assert!(MonthlySchedule::parse(15, "24:00").is_err());
        assert!(MonthlySchedule::parse(15, "12:60").is_err());
        assert!(MonthlySchedule::parse(15, "9am").is_err());
        assert!(MonthlySchedule::parse(15, "").is_err());
    }

    #[test]
    fn test_parse_accepts_valid_time() {
        let s = MonthlySchedule::parse(15, "23:59").unwrap();
        assert_eq!((s.hour, s.minute), (23, 59));
        assert_eq!(s.time_string(), "23:59");
    }

    #[test]
    fn test_next_monthly_same_month() {
        let s = MonthlySchedule::parse(31, "09:00").unwrap();
        let next = next_monthly_send(utc(2025, 1, 10, 0, 0), &s);
        assert_eq!(next, utc(2025, 1, 28, 9, 0));
    }

    #[test]
    fn test_next_monthly_advances_when_passed() {
        let s = MonthlySchedule::parse(28, "09:00").unwrap();
        let next = next_monthly_send(utc(2025, 1, 28, 10, 0), &s);
        assert_eq!(next, utc(2025, 2, 28, 9, 0));
    }

    #[test]
    fn test_next_monthly_exactly_at_schedule_advances() {
        let s = MonthlySchedule::parse(10, "08:30").unwrap();
        let next = next_monthly_send(utc(2025, 4, 10, 8, 30), &s);
        assert_eq!(next, utc(2025, 5, 10, 8, 30));
    }

    #[test]
    fn test_next_monthly_december_rolls_to_january() {
        let s = MonthlySchedule::parse(5, "07:00").unwrap();
        let next = next_monthly_send(utc(2025, 12, 20, 0, 0), &s);
        assert_eq!(next, utc(2026, 1, 5, 7, 0));
    }

    #[test]
    fn test_next_monthly_february_stays_valid() {
        let s = MonthlySchedule::parse(30, "09:00").unwrap();
        let next = next_monthly_send(utc(2025, 1, 29, 0, 0), &s);
        // Clamped day lands on Feb 28, a real date.
        assert_eq!(next, utc(2025, 2, 28, 9, 0));
    }

    #[test]
    fn test_one_time_rfc3339() {
        let now = utc(2025, 1, 1, 0, 0);
        let at = parse_one_time("2025-06-01T09:00:00Z", now).unwrap();
        assert_eq!(at, utc(2025, 6, 1, 9, 0));
    }

    #[test]
    fn test_one_time_rfc3339_with_offset() {
        let now = utc(2025, 1, 1, 0, 0);
        let at = parse_one_time("2025-06-01T09:00:00+02:00", now).unwrap();
        assert_eq!(at, utc(2025, 6, 1, 7, 0));
    }

    #[test]
    fn test_one_time_local_literal() {
        let now = utc(2025, 1, 1, 0, 0);
        let at = parse_one_time("2025-03-15T18:30", now).unwrap();
        assert_eq!(at, utc(2025, 3, 15, 18, 30));
    }

    #[test]
    fn test_one_time_must_be_future() {
        let now = utc(2025, 6, 1, 9, 0);
        assert!(parse_one_time("2025-06-01T09:00:00Z", now).is_err());
        assert!(parse_one_time("2024-01-01T00:00", now).is_err());
    }

    #[test]
    fn test_first_send_after_per_kind() {
        let now = utc(2025, 1, 10, 0, 0);
        let monthly = ReminderSchedule::Monthly(MonthlySchedule::parse(15, "09:00").unwrap());
        assert_eq!(monthly.first_send_after(now), utc(2025, 1, 15, 9, 0));

        let at = utc(2025, 3, 1, 12, 0);
        assert_eq!(ReminderSchedule::OneTime(at).first_send_after(now), at);
    }

    #[test]
    fn test_one_time_garbage_rejected() {
        let now = utc(2025, 1, 1, 0, 0);
        assert!(parse_one_time("next tuesday", now).is_err());
    }
}
