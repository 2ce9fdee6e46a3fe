//! Read-side queries over the application's card/item/user tables.
//!
//! The engine never writes these tables; it reads them for eligibility
//! checks and email content.

use rusqlite::{params, OptionalExtension};

use super::*;

fn map_card(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbCard> {
    Ok(DbCard {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        year: row.get(3)?,
        grid_size: row.get(4)?,
        free_space_position: row.get(5)?,
        finalized: row.get(6)?,
        archived: row.get(7)?,
    })
}

impl ReminderDb {
    /// Look up a user.
    pub fn get_user(&self, user_id: &str) -> Result<Option<DbUser>, DbError> {
        self.conn
            .query_row(
                "SELECT id, email, email_verified, display_name FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(DbUser {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        email_verified: row.get(2)?,
                        display_name: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(DbError::from)
    }

    /// Look up a card regardless of owner.
    pub fn get_card(&self, card_id: &str) -> Result<Option<DbCard>, DbError> {
        self.conn
            .query_row(
                "SELECT id, user_id, title, year, grid_size, free_space_position,
                        finalized, archived
                 FROM bingo_cards WHERE id = ?1",
                params![card_id],
                map_card,
            )
            .optional()
            .map_err(DbError::from)
    }

    /// Look up a card scoped to its owner.
    pub fn get_card_for_user(
        &self,
        user_id: &str,
        card_id: &str,
    ) -> Result<Option<DbCard>, DbError> {
        self.conn
            .query_row(
                "SELECT id, user_id, title, year, grid_size, free_space_position,
                        finalized, archived
                 FROM bingo_cards WHERE id = ?1 AND user_id = ?2",
                params![card_id, user_id],
                map_card,
            )
            .optional()
            .map_err(DbError::from)
    }

    /// Look up an item together with its card, scoped to the card's owner.
    pub fn get_item_for_user(
        &self,
        user_id: &str,
        item_id: &str,
    ) -> Result<Option<(DbItem, DbCard)>, DbError> {
        self.conn
            .query_row(
                "SELECT i.id, i.card_id, i.position, i.text, i.completed_at, i.created_at,
                        c.id, c.user_id, c.title, c.year, c.grid_size, c.free_space_position,
                        c.finalized, c.archived
                 FROM bingo_items i
                 JOIN bingo_cards c ON i.card_id = c.id
                 WHERE i.id = ?1 AND c.user_id = ?2",
                params![item_id, user_id],
                |row| {
                    let item = DbItem {
                        id: row.get(0)?,
                        card_id: row.get(1)?,
                        position: row.get(2)?,
                        text: row.get(3)?,
                        completed_at: row.get(4)?,
                        created_at: row.get(5)?,
                    };
                    let card = DbCard {
                        id: row.get(6)?,
                        user_id: row.get(7)?,
                        title: row.get(8)?,
                        year: row.get(9)?,
                        grid_size: row.get(10)?,
                        free_space_position: row.get(11)?,
                        finalized: row.get(12)?,
                        archived: row.get(13)?,
                    };
                    Ok((item, card))
                },
            )
            .optional()
            .map_err(DbError::from)
    }

    /// All items on a card, position order.
    pub fn list_card_items(&self, card_id: &str) -> Result<Vec<DbItem>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, card_id, position, text, completed_at, created_at
             FROM bingo_items WHERE card_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![card_id], |row| {
            Ok(DbItem {
                id: row.get(0)?,
                card_id: row.get(1)?,
                position: row.get(2)?,
                text: row.get(3)?,
                completed_at: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

/// A card qualifies for reminders while it is finalized and not archived.
pub fn card_is_eligible(card: &DbCard) -> bool {
    card.finalized && !card.archived
}
