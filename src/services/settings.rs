//! Reminder settings: lazy creation and the verified-email gate.

use chrono::{DateTime, Utc};

use crate::db::{DbReminderSettings, ReminderDb};
use crate::error::ReminderError;

/// Fetch a user's settings, creating the default row on first access.
pub fn get_settings(
    db: &ReminderDb,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<DbReminderSettings, ReminderError> {
    db.get_user(user_id)?.ok_or(ReminderError::ReminderNotFound)?;
    Ok(db.ensure_settings(user_id, now)?)
}

/// Update a user's settings. Enabling email requires a verified address.
pub fn update_settings(
    db: &ReminderDb,
    user_id: &str,
    email_enabled: bool,
    daily_email_cap: i64,
    now: DateTime<Utc>,
) -> Result<DbReminderSettings, ReminderError> {
    let user = db.get_user(user_id)?.ok_or(ReminderError::ReminderNotFound)?;
    if email_enabled && !user.email_verified {
        return Err(ReminderError::EmailNotVerified);
    }

    db.ensure_settings(user_id, now)?;
    db.update_settings(user_id, email_enabled, daily_email_cap, now)?;
    Ok(db.ensure_settings(user_id, now)?)
}
