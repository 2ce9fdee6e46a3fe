//! Service configuration, loaded from a JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "https://goalbingo.app".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_batch_limit() -> usize {
    25
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Explicit database path; falls back to `~/.goalbingo/reminders.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    /// Public origin used to build unsubscribe and image links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Daemon poll interval.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Per-pass claim limit for each reminder kind.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// SMTP delivery settings. Absent means no transport is configured and
    /// every dispatch attempt records a failure and defers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            batch_limit: default_batch_limit(),
            smtp: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// RFC5322 mailbox, e.g. `Goal Bingo <reminders@goalbingo.app>`.
    pub from_address: String,
}

impl Config {
    /// Default config location: `~/.goalbingo/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".goalbingo").join("config.json"))
    }

    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let config = Config::load(Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.batch_limit, 25);
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = serde_json::from_str(
            r#"{"baseUrl": "https://bingo.example", "smtp": {"host": "mail.example", "fromAddress": "Goal Bingo <r@bingo.example>"}}"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://bingo.example");
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert!(smtp.username.is_none());
    }
}
