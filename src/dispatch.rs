//! Due-job dispatch: claim, gate, cap, compose, send, record, reschedule.
//!
//! `run_due` is the engine's single background entry point. It is safe to
//! invoke repeatedly, overlapping, and from multiple processes: claiming
//! partitions the due set between passes, and every per-job decision
//! (eligibility, cap, outcome logging, rescheduling) happens inside one
//! `BEGIN IMMEDIATE` transaction.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::clock::parse_ts;
use crate::compose::{self, CheckinEmailContext, GoalEmailContext};
use crate::db::cards::card_is_eligible;
use crate::db::checkins::DueCheckin;
use crate::db::goals::DueGoal;
use crate::db::{EmailLogSource, EmailLogStatus, ReminderDb};
use crate::error::ReminderError;
use crate::lines::count_lines;
use crate::recommend::{recommend_goals, RecommendInput};
use crate::schedule::{next_monthly_send, MonthlySchedule};
use crate::transport::EmailTransport;

/// Retry delay after a delivery failure.
pub const FAILURE_RETRY_MINUTES: i64 = 15;

/// Fixed cap: one successful check-in email per user per day.
pub const CHECKIN_DAILY_CAP: i64 = 1;

/// Goal cap fallback when the settings value is unset or non-positive.
pub const DEFAULT_GOAL_DAILY_CAP: i64 = 3;

/// How many goals a check-in email suggests.
const RECOMMENDATION_LIMIT: usize = 3;

/// Where a job landed this poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivery succeeded; recurrence advanced (or one-shot retired).
    Sent,
    /// Daily cap reached; pushed to the same time-of-day tomorrow.
    DeferredCap,
    /// Delivery failed; retried in 15 minutes, recurrence untouched.
    DeferredFailure,
    /// Target no longer qualifies; permanently disabled.
    Disabled,
    /// Row changed under us between claim and processing; left alone.
    Skipped,
}

/// Tally of one `run_due` pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDueReport {
    pub checkins_claimed: usize,
    pub goals_claimed: usize,
    pub sent: usize,
    pub deferred_cap: usize,
    pub deferred_failure: usize,
    pub disabled: usize,
    pub errors: usize,
}

impl RunDueReport {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::DeferredCap => self.deferred_cap += 1,
            DispatchOutcome::DeferredFailure => self.deferred_failure += 1,
            DispatchOutcome::Disabled => self.disabled += 1,
            DispatchOutcome::Skipped => {}
        }
    }
}

/// Claim and process everything due at `now`, up to `limit` jobs per kind.
/// Returns the pass tally; `report.sent` is the delivered-email count.
pub fn run_due(
    db: &ReminderDb,
    transport: Option<&dyn EmailTransport>,
    base_url: &str,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<RunDueReport, ReminderError> {
    let mut report = RunDueReport::default();

    let checkins = db.claim_due_checkins(now, limit)?;
    report.checkins_claimed = checkins.len();
    for job in checkins {
        let id = job.reminder.id.clone();
        match process_checkin(db, transport, base_url, &job, now) {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                report.errors += 1;
                log::warn!("Check-in reminder {id} failed to process, leaving due: {e}");
                let _ = db.release_checkin_claim(&id);
            }
        }
    }

    let goals = db.claim_due_goals(now, limit)?;
    report.goals_claimed = goals.len();
    for job in goals {
        let id = job.reminder.id.clone();
        match process_goal(db, transport, base_url, &job, now) {
            Ok(outcome) => report.record(outcome),
            Err(e) => {
                report.errors += 1;
                log::warn!("Goal reminder {id} failed to process, leaving due: {e}");
                let _ = db.release_goal_claim(&id);
            }
        }
    }

    log::info!(
        "run_due: {} check-in(s) + {} goal(s) claimed, {} sent, {} cap-deferred, {} failed, {} disabled",
        report.checkins_claimed,
        report.goals_claimed,
        report.sent,
        report.deferred_cap,
        report.deferred_failure,
        report.disabled
    );
    Ok(report)
}

/// Same time-of-day on the next calendar day.
fn next_day_at(now: DateTime<Utc>, time: NaiveTime) -> DateTime<Utc> {
    (now + Duration::days(1)).date_naive().and_time(time).and_utc()
}

fn attempt_send(
    transport: Option<&dyn EmailTransport>,
    email: &crate::transport::OutboundEmail,
) -> Result<(), ReminderError> {
    match transport {
        Some(t) => t.send(email),
        None => Err(ReminderError::Transport(
            "no email transport configured".to_string(),
        )),
    }
}

/// One check-in job: due → disabled | deferred(cap) | sent | deferred(failure).
fn process_checkin(
    db: &ReminderDb,
    transport: Option<&dyn EmailTransport>,
    base_url: &str,
    job: &DueCheckin,
    now: DateTime<Utc>,
) -> Result<DispatchOutcome, ReminderError> {
    db.with_transaction(|db| {
        // Re-read inside the transaction; the claim snapshot may be stale.
        let Some(reminder) = db.get_checkin(&job.reminder.id)? else {
            return Ok(DispatchOutcome::Skipped);
        };
        if !reminder.enabled || reminder.next_send_at.is_none() {
            db.release_checkin_claim(&reminder.id)?;
            return Ok(DispatchOutcome::Skipped);
        }

        let schedule = MonthlySchedule::parse(reminder.day_of_month, &reminder.send_time)?;

        // Eligibility gate: the card must still resolve under this user,
        // finalized and unarchived.
        let card = db
            .get_card_for_user(&reminder.user_id, &reminder.card_id)?
            .filter(card_is_eligible);
        let Some(card) = card else {
            db.disable_checkin(&reminder.id, now)?;
            log::info!(
                "Check-in reminder {} disabled: card {} no longer eligible",
                reminder.id,
                reminder.card_id
            );
            return Ok(DispatchOutcome::Disabled);
        };

        // Cap decision: settings read and log count share this transaction,
        // so two jobs for the same user can't both pass under the cap.
        db.ensure_settings(&reminder.user_id, now)?;
        let sent_today =
            db.count_sent_on(&reminder.user_id, EmailLogSource::CardCheckin, now.date_naive())?;
        if sent_today >= CHECKIN_DAILY_CAP {
            let retry_at = next_day_at(now, schedule.time_of_day());
            db.defer_checkin(&reminder.id, retry_at, now)?;
            return Ok(DispatchOutcome::DeferredCap);
        }

        // Compose.
        let items = db.list_card_items(&card.id)?;
        let grid_size = card.grid_size.max(0) as usize;
        let free_space = card.free_space_position.and_then(|p| usize::try_from(p).ok());
        let completed: Vec<usize> = items
            .iter()
            .filter(|i| i.completed_at.is_some())
            .filter_map(|i| usize::try_from(i.position).ok())
            .collect();
        let progress = count_lines(grid_size, &completed, free_space);

        let recommendations = if reminder.include_recommendations {
            let inputs: Vec<RecommendInput> = items
                .iter()
                .filter_map(|i| {
                    usize::try_from(i.position).ok().map(|position| RecommendInput {
                        position,
                        text: i.text.clone(),
                        completed: i.completed_at.is_some(),
                        created_at: i.created_at.clone(),
                    })
                })
                .collect();
            recommend_goals(&inputs, grid_size, free_space, RECOMMENDATION_LIMIT)
        } else {
            Vec::new()
        };

        let unsubscribe_token = db.mint_unsubscribe_token(&reminder.user_id, now)?;
        let unsubscribe_url = compose::unsubscribe_url(base_url, &unsubscribe_token);
        let image_url = if reminder.include_image {
            let token =
                db.reuse_or_mint_image_token(&reminder.user_id, &card.id, true, now)?;
            Some(compose::image_url(base_url, &token))
        } else {
            None
        };

        let email = compose::checkin_email(&CheckinEmailContext {
            recipient: &job.user_email,
            user_name: job.user_name.as_deref(),
            card_title: &card.title,
            progress,
            recommendations: &recommendations,
            unsubscribe_url: &unsubscribe_url,
            image_url: image_url.as_deref(),
        });

        match attempt_send(transport, &email) {
            Ok(()) => {
                db.upsert_checkin_log(
                    &reminder.user_id,
                    &reminder.id,
                    EmailLogStatus::Sent,
                    now,
                )?;
                db.mark_checkin_sent(&reminder.id, now, next_monthly_send(now, &schedule))?;
                Ok(DispatchOutcome::Sent)
            }
            Err(e) => {
                log::warn!("Check-in reminder {} delivery failed: {e}", reminder.id);
                db.upsert_checkin_log(
                    &reminder.user_id,
                    &reminder.id,
                    EmailLogStatus::Failed,
                    now,
                )?;
                db.defer_checkin(
                    &reminder.id,
                    now + Duration::minutes(FAILURE_RETRY_MINUTES),
                    now,
                )?;
                Ok(DispatchOutcome::DeferredFailure)
            }
        }
    })
}

/// One goal job: due → disabled | deferred(cap) | sent | deferred(failure).
fn process_goal(
    db: &ReminderDb,
    transport: Option<&dyn EmailTransport>,
    base_url: &str,
    job: &DueGoal,
    now: DateTime<Utc>,
) -> Result<DispatchOutcome, ReminderError> {
    db.with_transaction(|db| {
        let Some(reminder) = db.get_goal_reminder(&job.reminder.id)? else {
            return Ok(DispatchOutcome::Skipped);
        };
        if !reminder.enabled || reminder.next_send_at.is_none() {
            db.release_goal_claim(&reminder.id)?;
            return Ok(DispatchOutcome::Skipped);
        }

        // Eligibility: the item must still resolve, incomplete, on an
        // eligible card. Each miss is a permanent disable, not a retry.
        let resolved = db
            .get_item_for_user(&reminder.user_id, &reminder.item_id)?
            .filter(|(_, card)| card_is_eligible(card));
        let Some((item, card)) = resolved else {
            db.disable_goal_reminder(&reminder.id, now)?;
            log::info!(
                "Goal reminder {} disabled: item {} no longer eligible",
                reminder.id,
                reminder.item_id
            );
            return Ok(DispatchOutcome::Disabled);
        };
        if item.completed_at.is_some() {
            db.disable_goal_reminder(&reminder.id, now)?;
            log::info!(
                "Goal reminder {} disabled: goal already completed",
                reminder.id
            );
            return Ok(DispatchOutcome::Disabled);
        }

        let settings = db.ensure_settings(&reminder.user_id, now)?;
        let cap = if settings.daily_email_cap > 0 {
            settings.daily_email_cap
        } else {
            DEFAULT_GOAL_DAILY_CAP
        };
        let sent_today =
            db.count_sent_on(&reminder.user_id, EmailLogSource::GoalReminder, now.date_naive())?;
        if sent_today >= cap {
            // Keep the job's own time-of-day when pushing to tomorrow.
            let time = reminder
                .next_send_at
                .as_deref()
                .and_then(parse_ts)
                .map(|ts| ts.time())
                .unwrap_or_else(|| now.time());
            db.defer_goal(&reminder.id, next_day_at(now, time), now)?;
            return Ok(DispatchOutcome::DeferredCap);
        }

        let unsubscribe_token = db.mint_unsubscribe_token(&reminder.user_id, now)?;
        let unsubscribe_url = compose::unsubscribe_url(base_url, &unsubscribe_token);
        let email = compose::goal_email(&GoalEmailContext {
            recipient: &job.user_email,
            user_name: job.user_name.as_deref(),
            card_title: &card.title,
            goal_text: &item.text,
            unsubscribe_url: &unsubscribe_url,
        });

        match attempt_send(transport, &email) {
            Ok(()) => {
                db.insert_goal_log(&reminder.user_id, &reminder.id, EmailLogStatus::Sent, now)?;
                db.mark_goal_sent(&reminder.id, now)?;
                Ok(DispatchOutcome::Sent)
            }
            Err(e) => {
                log::warn!("Goal reminder {} delivery failed: {e}", reminder.id);
                db.insert_goal_log(&reminder.user_id, &reminder.id, EmailLogStatus::Failed, now)?;
                db.defer_goal(
                    &reminder.id,
                    now + Duration::minutes(FAILURE_RETRY_MINUTES),
                    now,
                )?;
                Ok(DispatchOutcome::DeferredFailure)
            }
        }
    })
}
