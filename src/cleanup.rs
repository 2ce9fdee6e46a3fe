//! Periodic data hygiene: expired tokens and stale email log rows.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::ReminderDb;
use crate::error::ReminderError;

/// Email log rows older than this are dropped.
pub const LOG_RETENTION_DAYS: i64 = 90;

/// What one sweep removed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub image_tokens_removed: usize,
    pub unsubscribe_tokens_removed: usize,
    pub log_rows_removed: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.image_tokens_removed + self.unsubscribe_tokens_removed + self.log_rows_removed
    }
}

/// Remove expired tokens of both kinds and email log rows past retention.
/// Idempotent; meant to run daily.
pub fn cleanup_old(db: &ReminderDb, now: DateTime<Utc>) -> Result<CleanupReport, ReminderError> {
    let (image_tokens_removed, unsubscribe_tokens_removed) = db.prune_expired_tokens(now)?;
    let log_rows_removed = db.prune_email_log(now, LOG_RETENTION_DAYS)?;

    let report = CleanupReport {
        image_tokens_removed,
        unsubscribe_tokens_removed,
        log_rows_removed,
    };
    if report.total() > 0 {
        log::info!(
            "Cleanup removed {} image token(s), {} unsubscribe token(s), {} log row(s)",
            report.image_tokens_removed,
            report.unsubscribe_tokens_removed,
            report.log_rows_removed
        );
    }
    Ok(report)
}
