//! Reminder daemon: polls for due reminders and sweeps stale data daily.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bingo_reminders::db::ReminderDb;
use bingo_reminders::service::ReminderService;
use bingo_reminders::transport::SmtpMailer;
use bingo_reminders::Config;

fn load_config() -> Config {
    let path = std::env::var("BINGO_REMINDERS_CONFIG")
        .map(PathBuf::from)
        .ok()
        .or_else(Config::default_path);
    match path {
        Some(path) => match Config::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{e}; using defaults");
                Config::default()
            }
        },
        None => Config::default(),
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config();

    let db_path = match &config.database_path {
        Some(path) => PathBuf::from(path),
        None => match ReminderDb::default_path() {
            Ok(path) => path,
            Err(e) => {
                log::error!("Cannot resolve database path: {e}");
                std::process::exit(1);
            }
        },
    };
    let db = match ReminderDb::open(&db_path) {
        Ok(db) => db,
        Err(e) => {
            log::error!("Cannot open database {}: {e}", db_path.display());
            std::process::exit(1);
        }
    };
    log::info!("Database: {}", db_path.display());

    let mut service = ReminderService::new(db, config.base_url.clone());
    match &config.smtp {
        Some(smtp) => match SmtpMailer::from_config(smtp) {
            Ok(mailer) => {
                log::info!("SMTP transport: {}:{}", smtp.host, smtp.port);
                service = service.with_transport(Arc::new(mailer));
            }
            Err(e) => {
                log::error!("SMTP configuration invalid: {e}");
                std::process::exit(1);
            }
        },
        None => {
            log::warn!("No SMTP transport configured; due reminders will defer until one exists");
        }
    }

    log::info!(
        "reminderd started (poll every {}s, batch limit {})",
        config.poll_interval_secs,
        config.batch_limit
    );

    let mut poll = tokio::time::interval(Duration::from_secs(config.poll_interval_secs.max(1)));
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Sweep on startup, then once a day.
    let mut cleanup = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
    cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                match service.run_due(config.batch_limit) {
                    Ok(report) => {
                        if report.checkins_claimed + report.goals_claimed > 0 {
                            log::debug!("Pass complete: {} sent", report.sent);
                        }
                    }
                    Err(e) => log::error!("Scheduler pass failed: {e}"),
                }
            }
            _ = cleanup.tick() => {
                if let Err(e) = service.cleanup_old() {
                    log::error!("Cleanup sweep failed: {e}");
                }
            }
        }
    }
}
