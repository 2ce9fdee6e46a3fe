//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from `users` (the slice the engine needs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUser {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
}

/// A row from `bingo_cards`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCard {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub year: Option<i64>,
    pub grid_size: i64,
    pub free_space_position: Option<i64>,
    pub finalized: bool,
    pub archived: bool,
}

/// A row from `bingo_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbItem {
    pub id: String,
    pub card_id: String,
    pub position: i64,
    pub text: String,
    pub completed_at: Option<String>,
    pub created_at: String,
}

/// A row from `reminder_settings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbReminderSettings {
    pub user_id: String,
    pub email_enabled: bool,
    pub daily_email_cap: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from `card_checkin_reminders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCheckinReminder {
    pub id: String,
    pub user_id: String,
    pub card_id: String,
    pub enabled: bool,
    pub frequency: String,
    pub day_of_month: i64,
    pub send_time: String,
    pub include_image: bool,
    pub include_recommendations: bool,
    pub next_send_at: Option<String>,
    pub last_sent_at: Option<String>,
}

/// A row from `goal_reminders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbGoalReminder {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub kind: String,
    pub remind_at: String,
    pub enabled: bool,
    pub next_send_at: Option<String>,
    pub last_sent_at: Option<String>,
}

/// A row from `reminder_image_tokens`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbImageToken {
    pub token: String,
    pub user_id: String,
    pub card_id: String,
    pub show_completions: bool,
    pub expires_at: String,
    pub access_count: i64,
}

/// A row from `reminder_unsubscribe_tokens`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUnsubscribeToken {
    pub token: String,
    pub user_id: String,
    pub expires_at: String,
    pub used_at: Option<String>,
}

/// The `source_type` discriminator in `reminder_email_log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailLogSource {
    CardCheckin,
    GoalReminder,
}

impl EmailLogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailLogSource::CardCheckin => "card_checkin",
            EmailLogSource::GoalReminder => "goal_reminder",
        }
    }
}

/// The `status` column in `reminder_email_log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailLogStatus {
    Sent,
    Failed,
}

impl EmailLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailLogStatus::Sent => "sent",
            EmailLogStatus::Failed => "failed",
        }
    }
}
