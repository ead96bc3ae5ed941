//! Durable store adapter.
//!
//! # Responsibility
//! - Define the raw key-value contract the task state is persisted through.
//! - Encode/decode the two persisted values (`todos`, `taskId`).
//!
//! # Invariants
//! - Store code holds no business logic; it only loads and saves values.
//! - Values are text: JSON for the collection, decimal for the counter.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite_kv;
pub mod task_store;

pub use memory::MemoryKvStore;
pub use sqlite_kv::SqliteKvStore;
pub use task_store::{TaskStore, TASK_COUNTER_KEY, TASK_COLLECTION_KEY};

pub type StoreResult<T> = Result<T, StoreError>;

/// Error for durable store reads and writes.
#[derive(Debug)]
pub enum StoreError {
    /// Backend transport failure.
    Db(DbError),
    /// A stored value exists but cannot be decoded.
    Malformed { key: String, message: String },
    /// Backend refused the operation (full, read-only, detached).
    Unavailable(String),
}

impl StoreError {
    /// Stable short code for log records and UI envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) => "store_db_error",
            Self::Malformed { .. } => "store_malformed",
            Self::Unavailable(_) => "store_unavailable",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Malformed { key, message } => {
                write!(f, "stored value `{key}` is malformed: {message}")
            }
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Malformed { .. } | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Raw string key-value persistence.
///
/// Mirrors the platform key-value store the UI historically used: values are
/// opaque text and absent keys read as `None`.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> StoreResult<()>;
    fn remove_item(&mut self, key: &str) -> StoreResult<()>;

    /// Writes several keys together.
    ///
    /// Backends that support transactions override this to make the write
    /// all-or-nothing. The default writes in order and stops at the first
    /// failure.
    fn set_items(&mut self, entries: &[(&str, &str)]) -> StoreResult<()> {
        for (key, value) in entries {
            self.set_item(key, value)?;
        }
        Ok(())
    }
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for Box<K> {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> StoreResult<()> {
        (**self).remove_item(key)
    }

    fn set_items(&mut self, entries: &[(&str, &str)]) -> StoreResult<()> {
        (**self).set_items(entries)
    }
}
