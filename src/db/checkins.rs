//! Storage for recurring card check-in reminders, including due-job claiming.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::clock::fmt_ts;

use super::*;

/// How long a claimed job stays invisible to other schedulers. If the
/// owning process dies mid-batch the lease expires and the job becomes
/// claimable again.
pub const CLAIM_LEASE_MINUTES: i64 = 5;

/// A claimed due job: the reminder row plus the recipient read in the
/// claim join.
#[derive(Debug, Clone)]
pub struct DueCheckin {
    pub reminder: DbCheckinReminder,
    pub user_email: String,
    pub user_name: Option<String>,
}

const CHECKIN_COLS: &str = "id, user_id, card_id, enabled, frequency, day_of_month, send_time,
     include_image, include_recommendations, next_send_at, last_sent_at";

fn map_checkin(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbCheckinReminder> {
    Ok(DbCheckinReminder {
        id: row.get(0)?,
        user_id: row.get(1)?,
        card_id: row.get(2)?,
        enabled: row.get(3)?,
        frequency: row.get(4)?,
        day_of_month: row.get(5)?,
        send_time: row.get(6)?,
        include_image: row.get(7)?,
        include_recommendations: row.get(8)?,
        next_send_at: row.get(9)?,
        last_sent_at: row.get(10)?,
    })
}

impl ReminderDb {
    pub fn get_checkin(&self, id: &str) -> Result<Option<DbCheckinReminder>, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {CHECKIN_COLS} FROM card_checkin_reminders WHERE id = ?1"),
                params![id],
                map_checkin,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn get_checkin_for_card(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Option<DbCheckinReminder>, DbError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {CHECKIN_COLS} FROM card_checkin_reminders
                     WHERE user_id = ?1 AND card_id = ?2"
                ),
                params![user_id, card_id],
                map_checkin,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn list_checkins(&self, user_id: &str) -> Result<Vec<DbCheckinReminder>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CHECKIN_COLS} FROM card_checkin_reminders
             WHERE user_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![user_id], map_checkin)?;
        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?);
        }
        Ok(reminders)
    }

    pub fn insert_checkin(
        &self,
        reminder: &DbCheckinReminder,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO card_checkin_reminders
               (id, user_id, card_id, enabled, frequency, day_of_month, send_time,
                include_image, include_recommendations, next_send_at, last_sent_at,
                claimed_until, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL, ?12, ?12)",
            params![
                reminder.id,
                reminder.user_id,
                reminder.card_id,
                reminder.enabled,
                reminder.frequency,
                reminder.day_of_month,
                reminder.send_time,
                reminder.include_image,
                reminder.include_recommendations,
                reminder.next_send_at,
                reminder.last_sent_at,
                fmt_ts(now),
            ],
        )?;
        Ok(())
    }

    /// Rewrite a check-in's configuration (schedule change / re-enable).
    /// `last_sent_at` is deliberately untouched.
    pub fn update_checkin_config(
        &self,
        id: &str,
        day_of_month: i64,
        send_time: &str,
        include_image: bool,
        include_recommendations: bool,
        next_send_at: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE card_checkin_reminders
             SET enabled = 1, day_of_month = ?2, send_time = ?3, include_image = ?4,
                 include_recommendations = ?5, next_send_at = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                id,
                day_of_month,
                send_time,
                include_image,
                include_recommendations,
                next_send_at,
                fmt_ts(now)
            ],
        )?;
        Ok(())
    }

    /// Delete a check-in; returns false if none existed.
    pub fn delete_checkin(&self, user_id: &str, card_id: &str) -> Result<bool, DbError> {
        let n = self.conn.execute(
            "DELETE FROM card_checkin_reminders WHERE user_id = ?1 AND card_id = ?2",
            params![user_id, card_id],
        )?;
        Ok(n > 0)
    }

    /// Claim up to `limit` due check-ins.
    ///
    /// One short `BEGIN IMMEDIATE` transaction: select due, enabled,
    /// unclaimed reminders whose user has email enabled and a verified
    /// address, then stamp each with a claim lease. Rows claimed by a
    /// concurrent pass fail the `claimed_until` predicate and are skipped
    /// rather than waited on.
    pub fn claim_due_checkins(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DueCheckin>, DbError> {
        let now_ts = fmt_ts(now);
        let lease_ts = fmt_ts(now + chrono::Duration::minutes(CLAIM_LEASE_MINUTES));

        self.with_transaction(|db| {
            let mut stmt = db.conn.prepare(
                "SELECT r.id, r.user_id, r.card_id, r.enabled, r.frequency, r.day_of_month,
                        r.send_time, r.include_image, r.include_recommendations,
                        r.next_send_at, r.last_sent_at, u.email, u.display_name
                 FROM card_checkin_reminders r
                 JOIN reminder_settings s ON s.user_id = r.user_id AND s.email_enabled = 1
                 JOIN users u ON u.id = r.user_id AND u.email_verified = 1
                 WHERE r.enabled = 1
                   AND r.next_send_at IS NOT NULL
                   AND r.next_send_at <= ?1
                   AND (r.claimed_until IS NULL OR r.claimed_until <= ?1)
                 ORDER BY r.next_send_at ASC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![now_ts, limit as i64], |row| {
                Ok(DueCheckin {
                    reminder: map_checkin(row)?,
                    user_email: row.get(11)?,
                    user_name: row.get(12)?,
                })
            })?;

            let mut claimed = Vec::new();
            for row in rows {
                claimed.push(row?);
            }

            for job in &claimed {
                db.conn.execute(
                    "UPDATE card_checkin_reminders SET claimed_until = ?2 WHERE id = ?1",
                    params![job.reminder.id, lease_ts],
                )?;
            }

            Ok::<_, DbError>(claimed)
        })
    }

    /// Drop the claim lease (job finished or intentionally left due).
    pub fn release_checkin_claim(&self, id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE card_checkin_reminders SET claimed_until = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Record a successful send: stamp `last_sent_at`, advance the
    /// recurrence, release the claim.
    pub fn mark_checkin_sent(
        &self,
        id: &str,
        sent_at: DateTime<Utc>,
        next_send_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE card_checkin_reminders
             SET last_sent_at = ?2, next_send_at = ?3, claimed_until = NULL, updated_at = ?2
             WHERE id = ?1",
            params![id, fmt_ts(sent_at), fmt_ts(next_send_at)],
        )?;
        Ok(())
    }

    /// Push `next_send_at` without touching `last_sent_at` or `enabled`
    /// (cap deferral and failure retry).
    pub fn defer_checkin(
        &self,
        id: &str,
        next_send_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE card_checkin_reminders
             SET next_send_at = ?2, claimed_until = NULL, updated_at = ?3
             WHERE id = ?1",
            params![id, fmt_ts(next_send_at), fmt_ts(now)],
        )?;
        Ok(())
    }

    /// Permanently disable (card gone or no longer eligible).
    pub fn disable_checkin(&self, id: &str, now: DateTime<Utc>) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE card_checkin_reminders
             SET enabled = 0, next_send_at = NULL, claimed_until = NULL, updated_at = ?2
             WHERE id = ?1",
            params![id, fmt_ts(now)],
        )?;
        Ok(())
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

    fn seed_checkin(db: &ReminderDb, id: &str, user_id: &str, card_id: &str, next: DateTime<Utc>) {
        let reminder = DbCheckinReminder {
            id: id.to_string(),
            user_id: user_id.to_string(),
            card_id: card_id.to_string(),
            enabled: true,
            frequency: "monthly".to_string(),
            day_of_month: 15,
            send_time: "09:00".to_string(),
            include_image: false,
            include_recommendations: true,
            next_send_at: Some(fmt_ts(next)),
            last_sent_at: None,
        };
        db.insert_checkin(&reminder, next).unwrap();
    }

    fn enable_email(db: &ReminderDb, user_id: &str) {
        db.ensure_settings(user_id, utc(2025, 1, 1, 0)).unwrap();
        db.update_settings(user_id, true, 3, utc(2025, 1, 1, 0))
            .unwrap();
    }

    #[test]
    fn test_claim_returns_due_jobs_in_order() {
        let db = test_db();
        seed_user(&db, "u1", "u1@example.com", true);
        enable_email(&db, "u1");
        seed_checkin(&db, "r-late", "u1", "c1", utc(2025, 3, 2, 9));
        seed_checkin(&db, "r-early", "u1", "c2", utc(2025, 3, 1, 9));
        seed_checkin(&db, "r-future", "u1", "c3", utc(2025, 4, 1, 9));

        let claimed = db.claim_due_checkins(utc(2025, 3, 10, 0), 10).unwrap();
        let ids: Vec<&str> = claimed.iter().map(|j| j.reminder.id.as_str()).collect();
        assert_eq!(ids, vec!["r-early", "r-late"]);
        assert_eq!(claimed[0].user_email, "u1@example.com");
    }

    #[test]
    fn test_claimed_jobs_invisible_to_second_pass() {
        let db = test_db();
        seed_user(&db, "u1", "u1@example.com", true);
        enable_email(&db, "u1");
        seed_checkin(&db, "r1", "u1", "c1", utc(2025, 3, 1, 9));

        let first = db.claim_due_checkins(utc(2025, 3, 10, 0), 10).unwrap();
        assert_eq!(first.len(), 1);

        let second = db.claim_due_checkins(utc(2025, 3, 10, 0), 10).unwrap();
        assert!(second.is_empty(), "claimed row must be skipped, not re-claimed");
    }

    #[test]
    fn test_expired_lease_is_reclaimable() {
        let db = test_db();
        seed_user(&db, "u1", "u1@example.com", true);
        enable_email(&db, "u1");
        seed_checkin(&db, "r1", "u1", "c1", utc(2025, 3, 1, 9));

        db.claim_due_checkins(utc(2025, 3, 10, 0), 10).unwrap();
        let later = utc(2025, 3, 10, 0) + chrono::Duration::minutes(CLAIM_LEASE_MINUTES + 1);
        let reclaimed = db.claim_due_checkins(later, 10).unwrap();
        assert_eq!(reclaimed.len(), 1);
    }

    #[test]
    fn test_claim_requires_settings_and_verification() {
        let db = test_db();
        // Verified user, email reminders never enabled.
        seed_user(&db, "u-off", "off@example.com", true);
        db.ensure_settings("u-off", utc(2025, 1, 1, 0)).unwrap();
        seed_checkin(&db, "r-off", "u-off", "c1", utc(2025, 3, 1, 9));
        // Enabled settings, unverified address.
        seed_user(&db, "u-unverified", "nv@example.com", false);
        enable_email(&db, "u-unverified");
        seed_checkin(&db, "r-unverified", "u-unverified", "c2", utc(2025, 3, 1, 9));

        let claimed = db.claim_due_checkins(utc(2025, 3, 10, 0), 10).unwrap();
        assert!(claimed.is_empty());
    }

    #[test]
    fn test_limit_caps_claim_batch() {
        let db = test_db();
        seed_user(&db, "u1", "u1@example.com", true);
        enable_email(&db, "u1");
        for i in 0..5 {
            seed_checkin(&db, &format!("r{i}"), "u1", &format!("c{i}"), utc(2025, 3, 1, 9));
        }
        let claimed = db.claim_due_checkins(utc(2025, 3, 10, 0), 2).unwrap();
        assert_eq!(claimed.len(), 2);
    }

    #[test]
    fn test_disable_clears_next_send() {
        let db = test_db();
        seed_user(&db, "u1", "u1@example.com", true);
        seed_checkin(&db, "r1", "u1", "c1", utc(2025, 3, 1, 9));

        db.disable_checkin("r1", utc(2025, 3, 2, 0)).unwrap();
        let r = db.get_checkin("r1").unwrap().unwrap();
        assert!(!r.enabled);
        assert!(r.next_send_at.is_none());
    }
}
