//! Card check-in reminder CRUD with eligibility validation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::fmt_ts;
use crate::db::cards::card_is_eligible;
use crate::db::{DbCheckinReminder, ReminderDb};
use crate::error::ReminderError;
use crate::schedule::{next_monthly_send, MonthlySchedule};

/// Parameters for creating or updating a check-in reminder.
#[derive(Debug, Clone)]
pub struct CheckinUpsert {
    pub card_id: String,
    pub day_of_month: i64,
    pub send_time: String,
    pub include_image: bool,
    pub include_recommendations: bool,
}

/// Create or reconfigure the check-in reminder for (user, card).
///
/// Validates the schedule and the card's eligibility up front; the first
/// send lands at the next occurrence of the schedule after `now`.
pub fn upsert_checkin(
    db: &ReminderDb,
    user_id: &str,
    request: &CheckinUpsert,
    now: DateTime<Utc>,
) -> Result<DbCheckinReminder, ReminderError> {
    let schedule = MonthlySchedule::parse(request.day_of_month, &request.send_time)?;

    let card = db
        .get_card_for_user(user_id, &request.card_id)?
        .ok_or(ReminderError::CardNotFound)?;
    if !card_is_eligible(&card) {
        return Err(ReminderError::CardNotEligible);
    }

    db.ensure_settings(user_id, now)?;

    let next_send = next_monthly_send(now, &schedule);

    if let Some(existing) = db.get_checkin_for_card(user_id, &request.card_id)? {
        db.update_checkin_config(
            &existing.id,
            schedule.day_of_month as i64,
            &schedule.time_string(),
            request.include_image,
            request.include_recommendations,
            &fmt_ts(next_send),
            now,
        )?;
        return db
            .get_checkin(&existing.id)?
            .ok_or(ReminderError::ReminderNotFound);
    }

    let reminder = DbCheckinReminder {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        card_id: request.card_id.clone(),
        enabled: true,
        frequency: "monthly".to_string(),
        day_of_month: schedule.day_of_month as i64,
        send_time: schedule.time_string(),
        include_image: request.include_image,
        include_recommendations: request.include_recommendations,
        next_send_at: Some(fmt_ts(next_send)),
        last_sent_at: None,
    };
    db.insert_checkin(&reminder, now)?;
    Ok(reminder)
}

pub fn list_checkins(
    db: &ReminderDb,
    user_id: &str,
) -> Result<Vec<DbCheckinReminder>, ReminderError> {
    Ok(db.list_checkins(user_id)?)
}

pub fn delete_checkin(
    db: &ReminderDb,
    user_id: &str,
    card_id: &str,
) -> Result<(), ReminderError> {
    if db.delete_checkin(user_id, card_id)? {
        Ok(())
    } else {
        Err(ReminderError::ReminderNotFound)
    }
}
