//! Outcome ledger for attempted reminder emails.
//!
//! Check-in rows are upserted per (reminder, day) so same-day retries
//! overwrite instead of duplicating, keeping the per-day cap count at one
//! row per reminder. Goal rows are insert-only: goals are one-shot today,
//! so duplicates can't happen; if goals ever become recurring this method
//! must change or same-day retries will double-count cap usage.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::clock::{fmt_date, fmt_ts};

use super::*;

impl ReminderDb {
    /// Upsert the day's log row for a check-in reminder.
    pub fn upsert_checkin_log(
        &self,
        user_id: &str,
        reminder_id: &str,
        status: EmailLogStatus,
        sent_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let sent_on = fmt_date(sent_at.date_naive());
        let updated = self.conn.execute(
            "UPDATE reminder_email_log
             SET user_id = ?1, status = ?3, sent_at = ?4
             WHERE source_type = 'card_checkin' AND source_id = ?2 AND sent_on = ?5",
            params![user_id, reminder_id, status.as_str(), fmt_ts(sent_at), sent_on],
        )?;
        if updated == 0 {
            self.conn.execute(
                "INSERT INTO reminder_email_log
                   (user_id, source_type, source_id, status, sent_at, sent_on)
                 VALUES (?1, 'card_checkin', ?2, ?3, ?4, ?5)",
                params![user_id, reminder_id, status.as_str(), fmt_ts(sent_at), sent_on],
            )?;
        }
        Ok(())
    }

    /// Append a log row for a goal reminder (insert-only).
    pub fn insert_goal_log(
        &self,
        user_id: &str,
        reminder_id: &str,
        status: EmailLogStatus,
        sent_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO reminder_email_log
               (user_id, source_type, source_id, status, sent_at, sent_on)
             VALUES (?1, 'goal_reminder', ?2, ?3, ?4, ?5)",
            params![
                user_id,
                reminder_id,
                status.as_str(),
                fmt_ts(sent_at),
                fmt_date(sent_at.date_naive())
            ],
        )?;
        Ok(())
    }

    /// Count a user's *successful* sends of one kind on a calendar day.
    /// This is the cap input; it must run inside the job transaction.
    pub fn count_sent_on(
        &self,
        user_id: &str,
        source: EmailLogSource,
        day: chrono::NaiveDate,
    ) -> Result<i64, DbError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM reminder_email_log
                 WHERE user_id = ?1 AND source_type = ?2 AND sent_on = ?3 AND status = 'sent'",
                params![user_id, source.as_str(), fmt_date(day)],
                |row| row.get(0),
            )
            .map_err(DbError::from)
    }

    /// Delete log rows older than `keep_days`. Returns rows removed.
    pub fn prune_email_log(&self, now: DateTime<Utc>, keep_days: i64) -> Result<usize, DbError> {
        let cutoff = fmt_ts(now - chrono::Duration::days(keep_days));
        let n = self.conn.execute(
            "DELETE FROM reminder_email_log WHERE sent_at < ?1",
            params![cutoff],
        )?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_checkin_log_upserts_same_day() {
        let db = test_db();
        db.upsert_checkin_log("u1", "r1", EmailLogStatus::Failed, utc(2025, 3, 1, 9))
            .unwrap();
        db.upsert_checkin_log("u1", "r1", EmailLogStatus::Sent, utc(2025, 3, 1, 11))
            .unwrap();

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM reminder_email_log", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1, "same-day retry overwrites, never duplicates");

        let status: String = db
            .conn_ref()
            .query_row("SELECT status FROM reminder_email_log", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "sent");
    }

    #[test]
    fn test_checkin_log_new_row_next_day() {
        let db = test_db();
        db.upsert_checkin_log("u1", "r1", EmailLogStatus::Sent, utc(2025, 3, 1, 9))
            .unwrap();
        db.upsert_checkin_log("u1", "r1", EmailLogStatus::Sent, utc(2025, 3, 2, 9))
            .unwrap();

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM reminder_email_log", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_goal_log_is_insert_only() {
        let db = test_db();
        db.insert_goal_log("u1", "g1", EmailLogStatus::Failed, utc(2025, 3, 1, 9))
            .unwrap();
        db.insert_goal_log("u1", "g1", EmailLogStatus::Sent, utc(2025, 3, 1, 10))
            .unwrap();

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM reminder_email_log", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_count_sent_on_ignores_failures_and_other_kinds() {
        let db = test_db();
        let day = utc(2025, 3, 1, 9);
        db.upsert_checkin_log("u1", "r1", EmailLogStatus::Sent, day)
            .unwrap();
        db.insert_goal_log("u1", "g1", EmailLogStatus::Sent, day).unwrap();
        db.insert_goal_log("u1", "g2", EmailLogStatus::Failed, day)
            .unwrap();

        assert_eq!(
            db.count_sent_on("u1", EmailLogSource::CardCheckin, day.date_naive())
                .unwrap(),
            1
        );
        assert_eq!(
            db.count_sent_on("u1", EmailLogSource::GoalReminder, day.date_naive())
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_prune_removes_only_old_rows() {
        let db = test_db();
        db.insert_goal_log("u1", "g-old", EmailLogStatus::Sent, utc(2024, 10, 1, 9))
            .unwrap();
        db.insert_goal_log("u1", "g-new", EmailLogStatus::Sent, utc(2025, 2, 25, 9))
            .unwrap();

        let removed = db.prune_email_log(utc(2025, 3, 1, 0), 90).unwrap();
        assert_eq!(removed, 1);

        let remaining: String = db
            .conn_ref()
            .query_row("SELECT source_id FROM reminder_email_log", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, "g-new");
    }
}
