//! Core state management for Taskpad.
//! This crate is the single source of truth for task invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod share;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::task::{Task, TaskDraft, TaskId, TaskValidationError};
pub use repo::events::{SubscriptionId, TaskChange, TaskListener};
pub use repo::task_repo::{Created, RepoError, RepoResult, TaskRepository, WriteOutcome};
pub use share::{
    format_task, parse_share_channel, share_task, ShareChannel, ShareError, SharePayload,
    ShareSink,
};
pub use store::{
    KeyValueStore, MemoryKvStore, SqliteKvStore, StoreError, StoreResult, TaskStore,
    TASK_COLLECTION_KEY, TASK_COUNTER_KEY,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
