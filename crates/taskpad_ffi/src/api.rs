//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the task repository to Dart through an explicitly owned
//!   `TaskSession` handle.
//! - Map core results into flat response envelopes the UI renders.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - All repository calls for one session are serialized by its mutex.
//! - `revision` increases after every applied change, so the UI re-reads
//!   `list()` only when it moved.

use log::warn;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use taskpad_core::{
    core_version as core_version_inner, init_logging as init_logging_inner,
    parse_share_channel, ping as ping_inner, SharePayload, SqliteKvStore, Task, TaskChange,
    TaskRepository, WriteOutcome,
};

const SESSION_DB_FILE_NAME: &str = "taskpad.sqlite3";
const SESSION_DB_PATH_ENV: &str = "TASKPAD_DB_PATH";

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Task row rendered by the list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub id: i64,
    pub title: String,
    pub about: String,
    /// Creation time in epoch milliseconds.
    pub created: i64,
    pub completed: bool,
}

impl From<Task> for TaskItem {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            about: task.about,
            created: task.created,
            completed: task.completed,
        }
    }
}

/// Result envelope for mutating calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    /// `false` only for rejected input (e.g. blank title).
    pub ok: bool,
    /// Target or created task id.
    pub task_id: Option<i64>,
    /// Whether in-memory state changed.
    pub changed: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
    /// Non-fatal persistence warning to surface as a notice.
    pub warning: Option<String>,
}

impl TaskActionResponse {
    fn from_write(task_id: i64, write: &WriteOutcome, message: &str) -> Self {
        let changed = write.is_changed();
        Self {
            ok: true,
            task_id: Some(task_id),
            changed,
            message: if changed {
                message.to_string()
            } else {
                "No changes.".to_string()
            },
            warning: write
                .warning()
                .map(|err| format!("Saved for this session only: {err}")),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_id: None,
            changed: false,
            message: message.into(),
            warning: None,
        }
    }
}

/// Share text and optional handoff URL; the UI performs the dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareResponse {
    pub ok: bool,
    pub text: String,
    /// Set for URL-scheme channels; `None` means copy `text` to clipboard.
    pub url: Option<String>,
    /// Notice to show when dispatching to this channel fails.
    pub failure_notice: String,
    pub message: String,
}

impl ShareResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: String::new(),
            url: None,
            failure_notice: String::new(),
            message: message.into(),
        }
    }
}

/// Opaque per-installation session owned by the UI.
#[flutter_rust_bridge::frb(opaque)]
pub struct TaskSession {
    repo: Mutex<TaskRepository<SqliteKvStore>>,
    revision: Arc<AtomicU64>,
    db_path: PathBuf,
}

impl TaskSession {
    /// Opens the store and loads persisted tasks.
    ///
    /// An empty `db_path` falls back to `TASKPAD_DB_PATH`, then to a file in
    /// the system temp directory.
    ///
    /// # FFI contract
    /// - Sync call; performs file IO.
    /// - Returns an error string only when the store cannot be opened.
    #[flutter_rust_bridge::frb(sync)]
    pub fn open(db_path: String) -> Result<TaskSession, String> {
        let db_path = resolve_db_path(&db_path);
        let kv = SqliteKvStore::open(&db_path)
            .map_err(|err| format!("task store open failed: {err}"))?;

        let revision = Arc::new(AtomicU64::new(0));
        let mut repo = TaskRepository::initialize(kv);
        let counter = Arc::clone(&revision);
        repo.subscribe(Arc::new(move |_: &TaskChange| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        Ok(Self {
            repo: Mutex::new(repo),
            revision,
            db_path,
        })
    }

    /// Path of the backing store file.
    #[flutter_rust_bridge::frb(sync)]
    pub fn db_path(&self) -> String {
        self.db_path.display().to_string()
    }

    /// Monotonic change counter.
    #[flutter_rust_bridge::frb(sync)]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Relaxed)
    }

    /// Returns the task list in insertion order.
    #[flutter_rust_bridge::frb(sync)]
    pub fn list(&self) -> Vec<TaskItem> {
        self.lock().list().into_iter().map(TaskItem::from).collect()
    }

    /// Re-reads persisted state, discarding in-memory state.
    #[flutter_rust_bridge::frb(sync)]
    pub fn reload(&self) -> Vec<TaskItem> {
        let mut repo = self.lock();
        repo.reload();
        repo.list().into_iter().map(TaskItem::from).collect()
    }

    #[flutter_rust_bridge::frb(sync)]
    pub fn create(&self, title: String, about: String) -> TaskActionResponse {
        match self.lock().create(&title, &about) {
            Ok(created) => {
                TaskActionResponse::from_write(created.task.id, &created.write, "Task created.")
            }
            Err(err) => TaskActionResponse::rejected(format!("task_create rejected: {err}")),
        }
    }

    #[flutter_rust_bridge::frb(sync)]
    pub fn update(&self, id: i64, title: String, about: String) -> TaskActionResponse {
        match self.lock().update(id, &title, &about) {
            Ok(write) => TaskActionResponse::from_write(id, &write, "Task updated."),
            Err(err) => TaskActionResponse::rejected(format!("task_update rejected: {err}")),
        }
    }

    #[flutter_rust_bridge::frb(sync)]
    pub fn delete(&self, id: i64) -> TaskActionResponse {
        let write = self.lock().delete(id);
        TaskActionResponse::from_write(id, &write, "Task deleted.")
    }

    #[flutter_rust_bridge::frb(sync)]
    pub fn toggle_completed(&self, id: i64) -> TaskActionResponse {
        let write = self.lock().toggle_completed(id);
        TaskActionResponse::from_write(id, &write, "Task updated.")
    }

    /// Renders share text and handoff URL for `channel`.
    ///
    /// `channel` is one of `clipboard|whatsapp|telegram|facebook|vk`.
    #[flutter_rust_bridge::frb(sync)]
    pub fn share(&self, id: i64, channel: String) -> ShareResponse {
        let channel = match parse_share_channel(&channel) {
            Ok(channel) => channel,
            Err(err) => return ShareResponse::failure(err.to_string()),
        };
        let Some(task) = self.lock().get(id) else {
            return ShareResponse::failure("Task not found");
        };

        let payload = SharePayload::new(&task, channel);
        ShareResponse {
            ok: true,
            text: payload.text,
            url: payload.url,
            failure_notice: channel.unavailable_notice().to_string(),
            message: format!("Ready to share via {channel}."),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskRepository<SqliteKvStore>> {
        self.repo.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("event=session_lock module=ffi status=warn error_code=mutex_poisoned");
            poisoned.into_inner()
        })
    }
}

fn resolve_db_path(requested: &str) -> PathBuf {
    let trimmed = requested.trim();
    if !trimmed.is_empty() {
        return PathBuf::from(trimmed);
    }
    if let Ok(raw) = std::env::var(SESSION_DB_PATH_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(SESSION_DB_FILE_NAME)
}
