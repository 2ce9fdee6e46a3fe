//! Opaque tokens backing embeddable snapshot images and one-click
//! unsubscribe links.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::clock::fmt_ts;

use super::*;

/// Image tokens stay valid for 14 days and are re-extended on reuse.
pub const IMAGE_TOKEN_TTL_DAYS: i64 = 14;

/// Unsubscribe tokens are single-use and expire after 30 days.
pub const UNSUBSCRIBE_TOKEN_TTL_DAYS: i64 = 30;

/// Mint an opaque token: 32 random bytes, hex-encoded.
pub fn mint_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

fn map_image_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbImageToken> {
    Ok(DbImageToken {
        token: row.get(0)?,
        user_id: row.get(1)?,
        card_id: row.get(2)?,
        show_completions: row.get(3)?,
        expires_at: row.get(4)?,
        access_count: row.get(5)?,
    })
}

impl ReminderDb {
    /// Reuse an unexpired image token for (user, card, show_completions),
    /// extending its expiry; mint a fresh one otherwise.
    pub fn reuse_or_mint_image_token(
        &self,
        user_id: &str,
        card_id: &str,
        show_completions: bool,
        now: DateTime<Utc>,
    ) -> Result<String, DbError> {
        let expires = fmt_ts(now + Duration::days(IMAGE_TOKEN_TTL_DAYS));

        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT token FROM reminder_image_tokens
                 WHERE user_id = ?1 AND card_id = ?2 AND show_completions = ?3
                   AND expires_at > ?4
                 ORDER BY expires_at DESC LIMIT 1",
                params![user_id, card_id, show_completions, fmt_ts(now)],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(token) = existing {
            self.conn.execute(
                "UPDATE reminder_image_tokens SET expires_at = ?2 WHERE token = ?1",
                params![token, expires],
            )?;
            return Ok(token);
        }

        let token = mint_token();
        self.conn.execute(
            "INSERT INTO reminder_image_tokens
               (token, user_id, card_id, show_completions, expires_at, access_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![token, user_id, card_id, show_completions, expires, fmt_ts(now)],
        )?;
        Ok(token)
    }

    /// Resolve an image token if it exists and hasn't expired, bumping its
    /// access count.
    pub fn access_image_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DbImageToken>, DbError> {
        let found = self
            .conn
            .query_row(
                "SELECT token, user_id, card_id, show_completions, expires_at, access_count
                 FROM reminder_image_tokens
                 WHERE token = ?1 AND expires_at > ?2",
                params![token, fmt_ts(now)],
                map_image_token,
            )
            .optional()?;

        if found.is_some() {
            self.conn.execute(
                "UPDATE reminder_image_tokens SET access_count = access_count + 1
                 WHERE token = ?1",
                params![token],
            )?;
        }
        Ok(found)
    }

    /// Mint a fresh single-use unsubscribe token for a user.
    pub fn mint_unsubscribe_token(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, DbError> {
        let token = mint_token();
        self.conn.execute(
            "INSERT INTO reminder_unsubscribe_tokens (token, user_id, expires_at, used_at, created_at)
             VALUES (?1, ?2, ?3, NULL, ?4)",
            params![
                token,
                user_id,
                fmt_ts(now + Duration::days(UNSUBSCRIBE_TOKEN_TTL_DAYS)),
                fmt_ts(now)
            ],
        )?;
        Ok(token)
    }

    pub fn get_unsubscribe_token(
        &self,
        token: &str,
    ) -> Result<Option<DbUnsubscribeToken>, DbError> {
        self.conn
            .query_row(
                "SELECT token, user_id, expires_at, used_at
                 FROM reminder_unsubscribe_tokens WHERE token = ?1",
                params![token],
                |row| {
                    Ok(DbUnsubscribeToken {
                        token: row.get(0)?,
                        user_id: row.get(1)?,
                        expires_at: row.get(2)?,
                        used_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(DbError::from)
    }

    pub fn mark_unsubscribe_token_used(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE reminder_unsubscribe_tokens SET used_at = ?2 WHERE token = ?1",
            params![token, fmt_ts(now)],
        )?;
        Ok(())
    }

    /// Delete expired tokens of both kinds. Returns (image, unsubscribe)
    /// rows removed.
    pub fn prune_expired_tokens(&self, now: DateTime<Utc>) -> Result<(usize, usize), DbError> {
        let ts = fmt_ts(now);
        let images = self.conn.execute(
            "DELETE FROM reminder_image_tokens WHERE expires_at <= ?1",
            params![ts],
        )?;
        let unsubscribes = self.conn.execute(
            "DELETE FROM reminder_unsubscribe_tokens WHERE expires_at <= ?1",
            params![ts],
        )?;
        Ok((images, unsubscribes))
    }
}
