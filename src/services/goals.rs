//! One-shot goal reminder CRUD with eligibility validation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::fmt_ts;
use crate::db::cards::card_is_eligible;
use crate::db::{DbGoalReminder, ReminderDb};
use crate::error::ReminderError;
use crate::schedule::parse_one_time;

/// Create or reschedule the one-shot reminder for (user, item).
///
/// `remind_at` accepts RFC3339 or a `YYYY-MM-DDTHH:MM` literal and must be
/// in the future. The target item must be incomplete and live on a
/// finalized, unarchived card belonging to the user.
pub fn upsert_goal_reminder(
    db: &ReminderDb,
    user_id: &str,
    item_id: &str,
    remind_at: &str,
    now: DateTime<Utc>,
) -> Result<DbGoalReminder, ReminderError> {
    let at = parse_one_time(remind_at, now)?;

    let (item, card) = db
        .get_item_for_user(user_id, item_id)?
        .ok_or(ReminderError::ItemNotFound)?;
    if !card_is_eligible(&card) {
        return Err(ReminderError::CardNotEligible);
    }
    if item.completed_at.is_some() {
        return Err(ReminderError::GoalCompleted);
    }

    db.ensure_settings(user_id, now)?;

    if let Some(existing) = db.get_goal_reminder_for_item(user_id, item_id)? {
        db.update_goal_schedule(&existing.id, &fmt_ts(at), now)?;
        return db
            .get_goal_reminder(&existing.id)?
            .ok_or(ReminderError::ReminderNotFound);
    }

    let reminder = DbGoalReminder {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        item_id: item_id.to_string(),
        kind: "one_time".to_string(),
        remind_at: fmt_ts(at),
        enabled: true,
        next_send_at: Some(fmt_ts(at)),
        last_sent_at: None,
    };
    db.insert_goal_reminder(&reminder, now)?;
    Ok(reminder)
}

pub fn list_goal_reminders(
    db: &ReminderDb,
    user_id: &str,
) -> Result<Vec<DbGoalReminder>, ReminderError> {
    Ok(db.list_goal_reminders(user_id)?)
}

pub fn delete_goal_reminder(
    db: &ReminderDb,
    user_id: &str,
    item_id: &str,
) -> Result<(), ReminderError> {
    if db.delete_goal_reminder(user_id, item_id)? {
        Ok(())
    } else {
        Err(ReminderError::ReminderNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
    }

    fn seed_board(db: &crate::db::ReminderDb) {
        seed_user(db, "u1", "u1@example.com", true);
        seed_card(db, "c1", "u1", 3, None, true, false);
        seed_item(db, "i-open", "c1", 0, "Learn to juggle", None);
        seed_item(db, "i-done", "c1", 1, "Run a 5k", Some(now()));
    }

    #[test]
    fn test_create_schedules_one_shot() {
        let db = test_db();
        seed_board(&db);

        let reminder =
            upsert_goal_reminder(&db, "u1", "i-open", "2025-06-01T09:00", now()).unwrap();
        assert_eq!(reminder.kind, "one_time");
        assert_eq!(reminder.next_send_at.as_deref(), Some("2025-06-01T09:00:00Z"));
    }

    #[test]
    fn test_reschedule_reuses_row_and_reenables() {
        let db = test_db();
        seed_board(&db);

        let first = upsert_goal_reminder(&db, "u1", "i-open", "2025-06-01T09:00", now()).unwrap();
        db.disable_goal_reminder(&first.id, now()).unwrap();

        let second = upsert_goal_reminder(&db, "u1", "i-open", "2025-07-01T09:00", now()).unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.enabled);
        assert_eq!(second.next_send_at.as_deref(), Some("2025-07-01T09:00:00Z"));
    }

    #[test]
    fn test_completed_item_rejected() {
        let db = test_db();
        seed_board(&db);

        assert!(matches!(
            upsert_goal_reminder(&db, "u1", "i-done", "2025-06-01T09:00", now()).unwrap_err(),
            ReminderError::GoalCompleted
        ));
    }

    #[test]
    fn test_item_scoping_and_card_eligibility() {
        let db = test_db();
        seed_board(&db);
        seed_user(&db, "u2", "u2@example.com", true);
        seed_card(&db, "c-archived", "u1", 3, None, true, true);
        seed_item(&db, "i-archived", "c-archived", 0, "Paint", None);

        assert!(matches!(
            upsert_goal_reminder(&db, "u2", "i-open", "2025-06-01T09:00", now()).unwrap_err(),
            ReminderError::ItemNotFound
        ));
        assert!(matches!(
            upsert_goal_reminder(&db, "u1", "i-archived", "2025-06-01T09:00", now()).unwrap_err(),
            ReminderError::CardNotEligible
        ));
    }

    #[test]
    fn test_past_instant_rejected() {
        let db = test_db();
        seed_board(&db);

        assert!(matches!(
            upsert_goal_reminder(&db, "u1", "i-open", "2024-01-01T09:00", now()).unwrap_err(),
            ReminderError::InvalidSchedule(_)
        ));
    }
}
