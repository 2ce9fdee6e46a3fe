//! Storage for one-shot goal reminders, including due-job claiming.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::clock::fmt_ts;

use super::checkins::CLAIM_LEASE_MINUTES;
use super::*;

/// A claimed due goal job.
#[derive(Debug, Clone)]
pub struct DueGoal {
    pub reminder: DbGoalReminder,
    pub user_email: String,
    pub user_name: Option<String>,
}

const GOAL_COLS: &str =
    "id, user_id, item_id, kind, remind_at, enabled, next_send_at, last_sent_at";

fn map_goal(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbGoalReminder> {
    Ok(DbGoalReminder {
        id: row.get(0)?,
        user_id: row.get(1)?,
        item_id: row.get(2)?,
        kind: row.get(3)?,
        remind_at: row.get(4)?,
        enabled: row.get(5)?,
        next_send_at: row.get(6)?,
        last_sent_at: row.get(7)?,
    })
}

impl ReminderDb {
    pub fn get_goal_reminder(&self, id: &str) -> Result<Option<DbGoalReminder>, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {GOAL_COLS} FROM goal_reminders WHERE id = ?1"),
                params![id],
                map_goal,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn get_goal_reminder_for_item(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Option<DbGoalReminder>, DbError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {GOAL_COLS} FROM goal_reminders WHERE user_id = ?1 AND item_id = ?2"
                ),
                params![user_id, item_id],
                map_goal,
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn list_goal_reminders(&self, user_id: &str) -> Result<Vec<DbGoalReminder>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GOAL_COLS} FROM goal_reminders WHERE user_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![user_id], map_goal)?;
        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?);
        }
        Ok(reminders)
    }

    pub fn insert_goal_reminder(
        &self,
        reminder: &DbGoalReminder,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO goal_reminders
               (id, user_id, item_id, kind, remind_at, enabled, next_send_at, last_sent_at,
                claimed_until, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?9)",
            params![
                reminder.id,
                reminder.user_id,
                reminder.item_id,
                reminder.kind,
                reminder.remind_at,
                reminder.enabled,
                reminder.next_send_at,
                reminder.last_sent_at,
                fmt_ts(now),
            ],
        )?;
        Ok(())
    }

    /// Re-point an existing goal reminder at a new instant (reschedule or
    /// re-enable after a send).
    pub fn update_goal_schedule(
        &self,
        id: &str,
        remind_at: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE goal_reminders
             SET enabled = 1, kind = 'one_time', remind_at = ?2, next_send_at = ?2,
                 updated_at = ?3
             WHERE id = ?1",
            params![id, remind_at, fmt_ts(now)],
        )?;
        Ok(())
    }

    pub fn delete_goal_reminder(&self, user_id: &str, item_id: &str) -> Result<bool, DbError> {
        let n = self.conn.execute(
            "DELETE FROM goal_reminders WHERE user_id = ?1 AND item_id = ?2",
            params![user_id, item_id],
        )?;
        Ok(n > 0)
    }

    /// Claim up to `limit` due goal reminders. Same claim-lease contract as
    /// `claim_due_checkins`.
    pub fn claim_due_goals(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DueGoal>, DbError> {
        let now_ts = fmt_ts(now);
        let lease_ts = fmt_ts(now + chrono::Duration::minutes(CLAIM_LEASE_MINUTES));

        self.with_transaction(|db| {
            let mut stmt = db.conn.prepare(
                "SELECT r.id, r.user_id, r.item_id, r.kind, r.remind_at, r.enabled,
                        r.next_send_at, r.last_sent_at, u.email, u.display_name
                 FROM goal_reminders r
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
                Ok(DueGoal {
                    reminder: map_goal(row)?,
                    user_email: row.get(8)?,
                    user_name: row.get(9)?,
                })
            })?;

            let mut claimed = Vec::new();
            for row in rows {
                claimed.push(row?);
            }

            for job in &claimed {
                db.conn.execute(
                    "UPDATE goal_reminders SET claimed_until = ?2 WHERE id = ?1",
                    params![job.reminder.id, lease_ts],
                )?;
            }

            Ok::<_, DbError>(claimed)
        })
    }

    pub fn release_goal_claim(&self, id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE goal_reminders SET claimed_until = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Record a successful one-shot send: stamp `last_sent_at` and
    /// permanently disable.
    pub fn mark_goal_sent(&self, id: &str, sent_at: DateTime<Utc>) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE goal_reminders
             SET last_sent_at = ?2, enabled = 0, next_send_at = NULL, claimed_until = NULL,
                 updated_at = ?2
             WHERE id = ?1",
            params![id, fmt_ts(sent_at)],
        )?;
        Ok(())
    }

    /// Push `next_send_at` without touching `last_sent_at` or `enabled`.
    pub fn defer_goal(
        &self,
        id: &str,
        next_send_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE goal_reminders
             SET next_send_at = ?2, claimed_until = NULL, updated_at = ?3
             WHERE id = ?1",
            params![id, fmt_ts(next_send_at), fmt_ts(now)],
        )?;
        Ok(())
    }

    /// Permanently disable (item completed or card no longer eligible).
    pub fn disable_goal_reminder(&self, id: &str, now: DateTime<Utc>) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE goal_reminders
             SET enabled = 0, next_send_at = NULL, claimed_until = NULL, updated_at = ?2
             WHERE id = ?1",
            params![id, fmt_ts(now)],
        )?;
        Ok(())
    }
}
