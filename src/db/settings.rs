//! Per-user reminder settings rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::clock::fmt_ts;

use super::*;

fn map_settings(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbReminderSettings> {
    Ok(DbReminderSettings {
        user_id: row.get(0)?,
        email_enabled: row.get(1)?,
        daily_email_cap: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

impl ReminderDb {
    /// Fetch the settings row for a user, creating it lazily if missing.
    /// Idempotent: concurrent callers race on `INSERT OR IGNORE` and both
    /// read back the same row.
    pub fn ensure_settings(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DbReminderSettings, DbError> {
        let ts = fmt_ts(now);
        self.conn.execute(
            "INSERT OR IGNORE INTO reminder_settings
               (user_id, email_enabled, daily_email_cap, created_at, updated_at)
             VALUES (?1, 0, 3, ?2, ?2)",
            params![user_id, ts],
        )?;
        self.conn
            .query_row(
                "SELECT user_id, email_enabled, daily_email_cap, created_at, updated_at
                 FROM reminder_settings WHERE user_id = ?1",
                params![user_id],
                map_settings,
            )
            .map_err(DbError::from)
    }

    /// Fetch the settings row without creating it.
    pub fn get_settings(&self, user_id: &str) -> Result<Option<DbReminderSettings>, DbError> {
        self.conn
            .query_row(
                "SELECT user_id, email_enabled, daily_email_cap, created_at, updated_at
                 FROM reminder_settings WHERE user_id = ?1",
                params![user_id],
                map_settings,
            )
            .optional()
            .map_err(DbError::from)
    }

    /// Overwrite a user's settings. The row must already exist
    /// (`ensure_settings` first).
    pub fn update_settings(
        &self,
        user_id: &str,
        email_enabled: bool,
        daily_email_cap: i64,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE reminder_settings
             SET email_enabled = ?2, daily_email_cap = ?3, updated_at = ?4
             WHERE user_id = ?1",
            params![user_id, email_enabled, daily_email_cap, fmt_ts(now)],
        )?;
        Ok(())
    }

    /// Turn email reminders off (unsubscribe path). Returns whether email
    /// was enabled before this call.
    pub fn disable_email(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool, DbError> {
        let settings = self.ensure_settings(user_id, now)?;
        if settings.email_enabled {
            self.conn.execute(
                "UPDATE reminder_settings SET email_enabled = 0, updated_at = ?2
                 WHERE user_id = ?1",
                params![user_id, fmt_ts(now)],
            )?;
        }
        Ok(settings.email_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_ensure_settings_is_lazy_and_idempotent() {
        let db = test_db();
        seed_user(&db, "u1", "u1@example.com", true);

        assert!(db.get_settings("u1").unwrap().is_none());

        let first = db.ensure_settings("u1", now()).unwrap();
        assert!(!first.email_enabled);
        assert_eq!(first.daily_email_cap, 3);

        let second = db.ensure_settings("u1", now()).unwrap();
        assert_eq!(second.created_at, first.created_at);

        let count: i32 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM reminder_settings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_disable_email_reports_prior_state() {
        let db = test_db();
        seed_user(&db, "u1", "u1@example.com", true);
        db.ensure_settings("u1", now()).unwrap();
        db.update_settings("u1", true, 3, now()).unwrap();

        assert!(db.disable_email("u1", now()).unwrap());
        assert!(!db.disable_email("u1", now()).unwrap());
        assert!(!db.get_settings("u1").unwrap().unwrap().email_enabled);
    }
}
