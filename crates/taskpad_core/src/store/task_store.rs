//! Typed task persistence over a raw key-value store.
//!
//! # Responsibility
//! - Load/save the task collection under `todos` as a JSON array.
//! - Load/save the identifier counter under `taskId` as decimal text.
//!
//! # Invariants
//! - Absent keys load as safe defaults (empty collection, counter 0).
//! - Present-but-undecodable values surface as `StoreError::Malformed`; the
//!   caller decides how to recover.
//! - Encoding round-trips every task field exactly.

use crate::model::task::{Task, TaskId};
use crate::store::{KeyValueStore, StoreError, StoreResult};

/// Storage key for the serialized task collection.
pub const TASK_COLLECTION_KEY: &str = "todos";
/// Storage key for the next identifier to allocate.
pub const TASK_COUNTER_KEY: &str = "taskId";

/// Durable store adapter for tasks.
#[derive(Debug)]
pub struct TaskStore<K: KeyValueStore> {
    kv: K,
}

impl<K: KeyValueStore> TaskStore<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    /// Loads the persisted collection in stored order.
    pub fn load_collection(&self) -> StoreResult<Vec<Task>> {
        match self.kv.get_item(TASK_COLLECTION_KEY)? {
            Some(raw) => decode_collection(&raw),
            None => Ok(Vec::new()),
        }
    }

    /// Replaces the persisted collection.
    pub fn save_collection(&mut self, tasks: &[Task]) -> StoreResult<()> {
        let encoded = encode_collection(tasks)?;
        self.kv.set_item(TASK_COLLECTION_KEY, &encoded)
    }

    /// Loads the next identifier to allocate.
    pub fn load_counter(&self) -> StoreResult<TaskId> {
        match self.kv.get_item(TASK_COUNTER_KEY)? {
            Some(raw) => decode_counter(&raw),
            None => Ok(0),
        }
    }

    /// Persists the next identifier to allocate.
    pub fn save_counter(&mut self, next_id: TaskId) -> StoreResult<()> {
        self.kv.set_item(TASK_COUNTER_KEY, &next_id.to_string())
    }

    /// Persists collection and counter in one backend write.
    pub fn save_snapshot(&mut self, tasks: &[Task], next_id: TaskId) -> StoreResult<()> {
        let encoded = encode_collection(tasks)?;
        let counter = next_id.to_string();
        self.kv.set_items(&[
            (TASK_COUNTER_KEY, counter.as_str()),
            (TASK_COLLECTION_KEY, encoded.as_str()),
        ])
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn into_kv(self) -> K {
        self.kv
    }
}

fn encode_collection(tasks: &[Task]) -> StoreResult<String> {
    serde_json::to_string(tasks).map_err(|err| StoreError::Malformed {
        key: TASK_COLLECTION_KEY.to_string(),
        message: err.to_string(),
    })
}

fn decode_collection(raw: &str) -> StoreResult<Vec<Task>> {
    serde_json::from_str::<Vec<Task>>(raw).map_err(|err| StoreError::Malformed {
        key: TASK_COLLECTION_KEY.to_string(),
        message: err.to_string(),
    })
}

fn decode_counter(raw: &str) -> StoreResult<TaskId> {
    let malformed = |message: String| StoreError::Malformed {
        key: TASK_COUNTER_KEY.to_string(),
        message,
    };

    let value = raw
        .trim()
        .parse::<TaskId>()
        .map_err(|err| malformed(format!("`{}`: {err}", raw.trim())))?;
    if value < 0 {
        return Err(malformed(format!("negative counter {value}")));
    }
    Ok(value)
}
