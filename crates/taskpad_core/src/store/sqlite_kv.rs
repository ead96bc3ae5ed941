//! SQLite-backed key-value store.
//!
//! # Responsibility
//! - Persist raw text values in the `kv_items` table.
//! - Make multi-key writes atomic through one transaction.
//!
//! # Invariants
//! - The wrapped connection has migrations applied (`db::open_db*`).

use crate::db::{open_db, open_db_in_memory};
use crate::store::{KeyValueStore, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const UPSERT_SQL: &str = "INSERT INTO kv_items (key, value, updated_at)
     VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
     ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at;";

/// Key-value store over a migrated SQLite connection.
pub struct SqliteKvStore {
    conn: Connection,
}

impl SqliteKvStore {
    /// Opens (or creates) the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    /// Opens a store that lives only as long as this value.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    /// Returns the underlying connection for diagnostics and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_items WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(UPSERT_SQL, params![key, value])?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM kv_items WHERE key = ?1;", [key])?;
        Ok(())
    }

    fn set_items(&mut self, entries: &[(&str, &str)]) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_SQL)?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
