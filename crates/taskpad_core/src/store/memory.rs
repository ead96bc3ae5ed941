//! In-process key-value store.
//!
//! Backs ephemeral sessions and tests. Counts write calls and can be
//! switched into a failing mode to exercise write-error paths.

use crate::store::{KeyValueStore, StoreError, StoreResult};
use std::collections::BTreeMap;

/// Ephemeral key-value store with a write probe.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    items: BTreeMap<String, String>,
    writes: usize,
    fail_writes: bool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-seeded with raw values.
    pub fn with_items<'a>(items: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    /// Number of successful write calls (`set_item`, `set_items`, `remove_item`).
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// When enabled, every write call fails with `StoreError::Unavailable`.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes {
            return Err(StoreError::Unavailable(
                "memory store is in failing mode".to_string(),
            ));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.items.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.items.remove(key);
        self.writes += 1;
        Ok(())
    }

    fn set_items(&mut self, entries: &[(&str, &str)]) -> StoreResult<()> {
        self.check_writable()?;
        for (key, value) in entries {
            self.items.insert((*key).to_string(), (*value).to_string());
        }
        self.writes += 1;
        Ok(())
    }
}
