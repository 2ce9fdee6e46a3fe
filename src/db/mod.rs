//! SQLite persistence for the reminder engine.
//!
//! The database is the coordination point for concurrent scheduler
//! invocations: claims, cap decisions, and outcome logging all happen
//! inside `BEGIN IMMEDIATE` transactions so overlapping `run_due` passes
//! (same process or not) serialize on the SQLite writer lock.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

pub mod types;
pub use types::*;

pub mod cards;
pub mod checkins;
pub mod email_log;
pub mod goals;
pub mod settings;
pub mod tokens;

pub struct ReminderDb {
    conn: Connection,
}

impl ReminderDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    ///
    /// `BEGIN IMMEDIATE` takes the writer lock up front, so everything the
    /// closure reads (settings row, today's log count) stays consistent
    /// with what it writes.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Self) -> Result<T, E>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::from(e)))?;
        match f(self) {
            Ok(val) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| E::from(DbError::from(e)))?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at the given path and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL for concurrent readers; busy_timeout so overlapping writer
        // transactions queue instead of failing immediately.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Default database location: `~/.goalbingo/reminders.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".goalbingo").join("reminders.db"))
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================


#[cfg(test)]
mod tests {
    use super::test_utils::test_db;

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        let count: i32 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM card_checkin_reminders", [], |row| {
                row.get(0)
            })
            .expect("card_checkin_reminders table should exist");
        assert_eq!(count, 0);

        let count: i32 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM reminder_email_log", [], |row| {
                row.get(0)
            })
            .expect("reminder_email_log table should exist");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let db = test_db();
        let result: Result<(), crate::db::DbError> = db.with_transaction(|db| {
            db.conn_ref()
                .execute(
                    "INSERT INTO users (id, email, email_verified, created_at, updated_at)
                     VALUES ('u1', 'a@b.c', 1, '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
                    [],
                )
                .map_err(crate::db::DbError::from)?;
            Err(crate::db::DbError::Migration("forced".into()))
        });
        assert!(result.is_err());

        let count: i32 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "insert should have rolled back");
    }
}
