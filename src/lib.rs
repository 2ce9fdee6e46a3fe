//! Reminder scheduling and delivery engine for goal bingo cards.
//!
//! Two reminder kinds: recurring monthly card check-ins and one-shot goal
//! nudges. The engine owns their schedules, the due-job scheduler, daily
//! send caps, the delivery outcome ledger, and the opaque tokens embedded
//! in outgoing email (snapshot images, one-click unsubscribe).

pub mod cleanup;
pub mod clock;
pub mod compose;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod lines;
pub mod migrations;
pub mod recommend;
pub mod schedule;
pub mod service;
pub mod services;
pub mod transport;

pub use config::Config;
pub use db::ReminderDb;
pub use error::ReminderError;
pub use service::ReminderService;
