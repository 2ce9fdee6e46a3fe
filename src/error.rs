//! Error taxonomy for the reminder engine.
//!
//! Errors split by what the caller should do with them:
//! - Validation errors surface directly from synchronous mutation calls.
//! - Ineligibility during dispatch disables the reminder (never retried).
//! - Delivery failure defers the job and retries soon.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Reminder not found")]
    ReminderNotFound,

    #[error("Card is not eligible for reminders (must be finalized and not archived)")]
    CardNotEligible,

    #[error("Card not found")]
    CardNotFound,

    #[error("Goal item not found")]
    ItemNotFound,

    #[error("Goal is already completed")]
    GoalCompleted,

    #[error("Email address is not verified")]
    EmailNotVerified,

    #[error("Email reminders are disabled for this user")]
    RemindersDisabled,

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Email delivery failed: {0}")]
    Transport(String),

    #[error("Snapshot rendering failed: {0}")]
    Render(String),
}

impl ReminderError {
    /// True for errors that mean the reminder's target no longer qualifies.
    /// Lets an HTTP layer map the taxonomy onto statuses without matching
    /// every variant.
    pub fn is_ineligibility(&self) -> bool {
        matches!(
            self,
            ReminderError::CardNotFound
                | ReminderError::CardNotEligible
                | ReminderError::ItemNotFound
                | ReminderError::GoalCompleted
        )
    }
}
