//! The engine's front door.
//!
//! `ReminderService` owns the database handle and the outward seams
//! (clock, email transport, snapshot renderer) and exposes every
//! operation the web layer and the daemon call. Construction wires real
//! collaborators in production and stubs in tests.

use std::sync::Arc;

use crate::cleanup::{self, CleanupReport};
use crate::clock::{Clock, SystemClock};
use crate::compose;
use crate::db::{DbCheckinReminder, DbGoalReminder, DbReminderSettings, ReminderDb};
use crate::dispatch::{self, RunDueReport};
use crate::error::ReminderError;
use crate::services;
use crate::transport::{EmailTransport, SnapshotRenderer};

pub use crate::services::checkins::CheckinUpsert;

/// What redeeming an unsubscribe token did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    /// Token consumed now. `was_enabled` is the state it turned off; false
    /// means the user had already disabled email some other way.
    Done { was_enabled: bool },
    /// Token was already consumed; nothing changed.
    AlreadyUsed,
}

pub struct ReminderService {
    db: ReminderDb,
    base_url: String,
    clock: Arc<dyn Clock>,
    transport: Option<Arc<dyn EmailTransport>>,
    renderer: Option<Arc<dyn SnapshotRenderer>>,
}

impl ReminderService {
    pub fn new(db: ReminderDb, base_url: impl Into<String>) -> Self {
        Self {
            db,
            base_url: base_url.into(),
            clock: Arc::new(SystemClock),
            transport: None,
            renderer: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn EmailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn SnapshotRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &ReminderDb {
        &self.db
    }

    // -- settings -----------------------------------------------------------

    pub fn get_settings(&self, user_id: &str) -> Result<DbReminderSettings, ReminderError> {
        services::settings::get_settings(&self.db, user_id, self.clock.now())
    }

    pub fn update_settings(
        &self,
        user_id: &str,
        email_enabled: bool,
        daily_email_cap: i64,
    ) -> Result<DbReminderSettings, ReminderError> {
        services::settings::update_settings(
            &self.db,
            user_id,
            email_enabled,
            daily_email_cap,
            self.clock.now(),
        )
    }

    // -- check-in reminders -------------------------------------------------

    pub fn upsert_checkin(
        &self,
        user_id: &str,
        request: &CheckinUpsert,
    ) -> Result<DbCheckinReminder, ReminderError> {
        services::checkins::upsert_checkin(&self.db, user_id, request, self.clock.now())
    }

    pub fn list_checkins(&self, user_id: &str) -> Result<Vec<DbCheckinReminder>, ReminderError> {
        services::checkins::list_checkins(&self.db, user_id)
    }

    pub fn delete_checkin(&self, user_id: &str, card_id: &str) -> Result<(), ReminderError> {
        services::checkins::delete_checkin(&self.db, user_id, card_id)
    }

    // -- goal reminders -----------------------------------------------------

    pub fn upsert_goal_reminder(
        &self,
        user_id: &str,
        item_id: &str,
        remind_at: &str,
    ) -> Result<DbGoalReminder, ReminderError> {
        services::goals::upsert_goal_reminder(&self.db, user_id, item_id, remind_at, self.clock.now())
    }

    pub fn list_goal_reminders(&self, user_id: &str) -> Result<Vec<DbGoalReminder>, ReminderError> {
        services::goals::list_goal_reminders(&self.db, user_id)
    }

    pub fn delete_goal_reminder(&self, user_id: &str, item_id: &str) -> Result<(), ReminderError> {
        services::goals::delete_goal_reminder(&self.db, user_id, item_id)
    }

    // -- delivery -----------------------------------------------------------

    /// Send a settings-page test email immediately. Bypasses scheduling
    /// and caps and writes no log row, but honors the verification and
    /// opt-in gates.
    pub fn send_test_email(&self, user_id: &str) -> Result<(), ReminderError> {
        let user = self
            .db
            .get_user(user_id)?
            .ok_or(ReminderError::ReminderNotFound)?;
        if !user.email_verified {
            return Err(ReminderError::EmailNotVerified);
        }
        let settings = self.db.ensure_settings(user_id, self.clock.now())?;
        if !settings.email_enabled {
            return Err(ReminderError::RemindersDisabled);
        }

        let email = compose::test_email(&user.email, user.display_name.as_deref());
        match &self.transport {
            Some(t) => t.send(&email),
            None => Err(ReminderError::Transport(
                "no email transport configured".to_string(),
            )),
        }
    }

    /// One scheduler pass over everything due now.
    pub fn run_due(&self, limit: usize) -> Result<RunDueReport, ReminderError> {
        dispatch::run_due(
            &self.db,
            self.transport.as_deref(),
            &self.base_url,
            self.clock.now(),
            limit,
        )
    }

    // -- tokens -------------------------------------------------------------

    /// Resolve an image token and render the card snapshot it points at.
    /// Unknown and expired tokens are indistinguishable to the caller.
    pub fn render_image_by_token(&self, token: &str) -> Result<Vec<u8>, ReminderError> {
        let now = self.clock.now();
        let token = self
            .db
            .access_image_token(token, now)?
            .ok_or(ReminderError::ReminderNotFound)?;
        let card = self
            .db
            .get_card(&token.card_id)?
            .ok_or(ReminderError::ReminderNotFound)?;
        let items = self.db.list_card_items(&card.id)?;

        match &self.renderer {
            Some(r) => r.render(&card, &items, token.show_completions),
            None => Err(ReminderError::Render(
                "no snapshot renderer configured".to_string(),
            )),
        }
    }

    /// One-click unsubscribe. First use turns email reminders off and
    /// consumes the token; replaying a consumed token is a no-op success
    /// so the link in an old email never shows the user an error.
    pub fn unsubscribe_by_token(&self, token: &str) -> Result<UnsubscribeOutcome, ReminderError> {
        let now = self.clock.now();
        self.db.with_transaction(|db| {
            let record = db
                .get_unsubscribe_token(token)?
                .ok_or(ReminderError::ReminderNotFound)?;
            if record.used_at.is_some() {
                return Ok(UnsubscribeOutcome::AlreadyUsed);
            }
            if record.expires_at.as_str() <= crate::clock::fmt_ts(now).as_str() {
                return Err(ReminderError::ReminderNotFound);
            }

            let was_enabled = db.disable_email(&record.user_id, now)?;
            db.mark_unsubscribe_token_used(token, now)?;
            Ok(UnsubscribeOutcome::Done { was_enabled })
        })
    }

    // -- maintenance --------------------------------------------------------

    pub fn cleanup_old(&self) -> Result<CleanupReport, ReminderError> {
        cleanup::cleanup_old(&self.db, self.clock.now())
    }
}
