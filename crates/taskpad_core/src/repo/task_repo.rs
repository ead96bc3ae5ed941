//! Task repository: in-memory collection, id allocation, write-through.
//!
//! # Responsibility
//! - Own every `Task` instance and the identifier counter.
//! - Apply create/update/delete/toggle in memory, then persist.
//! - Notify subscribed listeners after each applied change.
//!
//! # Invariants
//! - Task ids are unique and strictly increasing in creation order.
//! - `next_id` is greater than every id ever issued and never moves back,
//!   including when the collection becomes empty.
//! - Collection order is insertion order; deletion keeps survivors in place.
//! - Persistence failures never roll back an applied in-memory change.
//! - Read failures at load fall back to safe defaults and never propagate.

use crate::model::task::{Task, TaskDraft, TaskId, TaskValidationError};
use crate::repo::events::{SubscriptionId, TaskChange, TaskListener};
use crate::store::{KeyValueStore, StoreError, TaskStore};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub type RepoResult<T> = Result<T, RepoError>;

/// Caller-facing repository error.
///
/// Persistence failures are not errors at this level; see `WriteOutcome`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    Validation(TaskValidationError),
    /// The counter cannot advance past its current value.
    IdSpaceExhausted(TaskId),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::IdSpaceExhausted(next_id) => {
                write!(f, "task id space exhausted at {next_id}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::IdSpaceExhausted(_) => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Durability result of a mutating call.
#[derive(Debug)]
pub enum WriteOutcome {
    /// Nothing matched or nothing differed; the store was not touched.
    Unchanged,
    /// Change applied and written to the durable store.
    Persisted,
    /// Change applied in memory; the durable write failed.
    NotPersisted(StoreError),
}

impl WriteOutcome {
    /// Returns whether in-memory state changed.
    pub fn is_changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    /// Returns the write failure to surface as a non-fatal warning.
    pub fn warning(&self) -> Option<&StoreError> {
        match self {
            Self::NotPersisted(err) => Some(err),
            Self::Unchanged | Self::Persisted => None,
        }
    }
}

/// Result of a successful `create`.
#[derive(Debug)]
pub struct Created {
    pub task: Task,
    pub write: WriteOutcome,
}

/// Single source of truth for the task collection.
pub struct TaskRepository<K: KeyValueStore> {
    store: TaskStore<K>,
    tasks: Vec<Task>,
    next_id: TaskId,
    listeners: BTreeMap<SubscriptionId, Arc<dyn TaskListener>>,
    next_subscription: u64,
    clock: fn() -> i64,
}

impl<K: KeyValueStore> TaskRepository<K> {
    /// Loads persisted state from `kv` and returns a ready repository.
    ///
    /// Never fails: a missing or malformed collection starts empty and a
    /// missing or malformed counter starts at 0.
    pub fn initialize(kv: K) -> Self {
        Self::initialize_with_clock(kv, now_epoch_ms)
    }

    /// Same as `initialize`, with an explicit creation-timestamp source.
    pub fn initialize_with_clock(kv: K, clock: fn() -> i64) -> Self {
        let mut repo = Self {
            store: TaskStore::new(kv),
            tasks: Vec::new(),
            next_id: 0,
            listeners: BTreeMap::new(),
            next_subscription: 0,
            clock,
        };
        repo.load_state();
        repo
    }

    /// Discards in-memory state and loads it again from the store.
    pub fn reload(&mut self) {
        self.load_state();
        self.notify(TaskChange::Loaded {
            count: self.tasks.len(),
        });
    }

    /// Returns a snapshot of the collection in insertion order.
    pub fn list(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    /// Returns a copy of one task.
    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.tasks.iter().find(|task| task.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Next identifier `create` will allocate.
    pub fn next_id(&self) -> TaskId {
        self.next_id
    }

    /// Creates a task at the tail of the collection.
    ///
    /// # Errors
    /// - `Validation(EmptyTitle)` when `title` is blank after trimming; no
    ///   state changes and nothing is written.
    /// - `IdSpaceExhausted` when `next_id` is `TaskId::MAX`; no state changes.
    pub fn create(&mut self, title: &str, about: &str) -> RepoResult<Created> {
        let draft = TaskDraft::new(title, about).inspect_err(|_| {
            debug!("event=task_create module=repo status=rejected error_code=empty_title");
        })?;

        let id = self.next_id;
        let Some(next_id) = id.checked_add(1) else {
            warn!("event=task_create module=repo status=error error_code=id_space_exhausted next_id={id}");
            return Err(RepoError::IdSpaceExhausted(id));
        };
        let task = Task::from_draft(id, draft, (self.clock)());
        self.tasks.push(task.clone());
        self.next_id = next_id;

        // Counter and collection go out in one write so a crash cannot
        // leave them out of step.
        let write = match self.store.save_snapshot(&self.tasks, self.next_id) {
            Ok(()) => WriteOutcome::Persisted,
            Err(err) => persist_failed("task_create", err),
        };

        info!(
            "event=task_create module=repo status=ok id={} count={} persisted={}",
            id,
            self.tasks.len(),
            write.warning().is_none()
        );
        self.notify(TaskChange::Created(id));
        Ok(Created { task, write })
    }

    /// Replaces title/description of an existing task.
    ///
    /// Unknown ids and unchanged text are no-ops that write nothing. The id
    /// is looked up before the input is validated, so an unknown id is a
    /// no-op even with a blank title.
    ///
    /// # Errors
    /// - `Validation(EmptyTitle)` when the task exists and `title` is blank
    ///   after trimming.
    pub fn update(&mut self, id: TaskId, title: &str, about: &str) -> RepoResult<WriteOutcome> {
        let Some(index) = self.tasks.iter().position(|task| task.id == id) else {
            debug!("event=task_update module=repo status=skipped reason=not_found id={id}");
            return Ok(WriteOutcome::Unchanged);
        };
        let draft = TaskDraft::new(title, about)?;

        let task = &mut self.tasks[index];
        if draft.matches(task) {
            debug!("event=task_update module=repo status=skipped reason=unchanged id={id}");
            return Ok(WriteOutcome::Unchanged);
        }

        task.title = draft.title;
        task.about = draft.about;

        let write = self.persist_collection("task_update");
        info!("event=task_update module=repo status=ok id={id}");
        self.notify(TaskChange::Updated(id));
        Ok(write)
    }

    /// Removes a task; does not affect `next_id`.
    pub fn delete(&mut self, id: TaskId) -> WriteOutcome {
        let Some(index) = self.tasks.iter().position(|task| task.id == id) else {
            debug!("event=task_delete module=repo status=skipped reason=not_found id={id}");
            return WriteOutcome::Unchanged;
        };
        self.tasks.remove(index);

        let write = self.persist_collection("task_delete");
        info!(
            "event=task_delete module=repo status=ok id={} count={}",
            id,
            self.tasks.len()
        );
        self.notify(TaskChange::Deleted(id));
        write
    }

    /// Flips the completion flag of a task.
    pub fn toggle_completed(&mut self, id: TaskId) -> WriteOutcome {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            debug!("event=task_toggle module=repo status=skipped reason=not_found id={id}");
            return WriteOutcome::Unchanged;
        };
        task.completed = !task.completed;
        let completed = task.completed;

        let write = self.persist_collection("task_toggle");
        info!("event=task_toggle module=repo status=ok id={id} completed={completed}");
        self.notify(TaskChange::Toggled { id, completed });
        write
    }

    /// Registers a change listener.
    pub fn subscribe(&mut self, listener: Arc<dyn TaskListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.insert(id, listener);
        id
    }

    /// Removes a listener; returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn store(&self) -> &TaskStore<K> {
        &self.store
    }

    /// Consumes the repository and returns the backing key-value store.
    pub fn into_store(self) -> K {
        self.store.into_kv()
    }

    fn load_state(&mut self) {
        let tasks = match self.store.load_collection() {
            Ok(tasks) => sanitize_loaded(tasks),
            Err(err) => {
                warn!(
                    "event=repo_load module=repo status=warn error_code={} fallback=empty_collection error={}",
                    err.code(),
                    err
                );
                Vec::new()
            }
        };

        let counter = match self.store.load_counter() {
            Ok(counter) => counter,
            Err(err) => {
                warn!(
                    "event=repo_load module=repo status=warn error_code={} fallback=counter_zero error={}",
                    err.code(),
                    err
                );
                0
            }
        };

        // `Task::validate` keeps loaded ids below TaskId::MAX.
        let floor = tasks
            .iter()
            .map(|task| task.id.saturating_add(1))
            .max()
            .unwrap_or(0);
        if counter < floor {
            warn!(
                "event=repo_load module=repo status=warn error_code=counter_behind_collection counter={counter} healed_to={floor}"
            );
        }

        self.tasks = tasks;
        self.next_id = counter.max(floor);
        info!(
            "event=repo_load module=repo status=ok count={} next_id={}",
            self.tasks.len(),
            self.next_id
        );
    }

    fn persist_collection(&mut self, event: &'static str) -> WriteOutcome {
        match self.store.save_collection(&self.tasks) {
            Ok(()) => WriteOutcome::Persisted,
            Err(err) => persist_failed(event, err),
        }
    }

    fn notify(&self, change: TaskChange) {
        debug!(
            "event={} module=repo status=notify listeners={}",
            change.event_name(),
            self.listeners.len()
        );
        for listener in self.listeners.values() {
            listener.on_change(&change);
        }
    }
}

fn persist_failed(event: &'static str, err: StoreError) -> WriteOutcome {
    warn!(
        "event={} module=repo status=warn error_code=persist_failed store_error={} error={}",
        event,
        err.code(),
        err
    );
    WriteOutcome::NotPersisted(err)
}

fn sanitize_loaded(tasks: Vec<Task>) -> Vec<Task> {
    let total = tasks.len();
    let mut seen = HashSet::with_capacity(total);
    let kept: Vec<Task> = tasks
        .into_iter()
        .map(|mut task| {
            // Older collections stored text untrimmed.
            task.title = task.title.trim().to_string();
            task.about = task.about.trim().to_string();
            task
        })
        .filter(|task| task.validate().is_ok() && seen.insert(task.id))
        .collect();
    if kept.len() != total {
        warn!(
            "event=repo_load module=repo status=warn error_code=invalid_records dropped={}",
            total - kept.len()
        );
    }
    kept
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{RepoError, TaskRepository, WriteOutcome};
    use crate::model::task::TaskValidationError;
    use crate::repo::events::TaskChange;
    use crate::store::{KeyValueStore, MemoryKvStore, StoreError, TASK_COLLECTION_KEY};
    use std::sync::{Arc, Mutex};

    fn fixed_clock() -> i64 {
        1_700_000_000_000
    }

    fn repo() -> TaskRepository<MemoryKvStore> {
        TaskRepository::initialize_with_clock(MemoryKvStore::new(), fixed_clock)
    }

    #[test]
    fn create_assigns_increasing_ids_and_defaults() {
        let mut repo = repo();
        let first = repo.create("  first ", " a ").unwrap();
        let second = repo.create("second", "").unwrap();

        assert_eq!(first.task.id, 0);
        assert_eq!(second.task.id, 1);
        assert_eq!(first.task.title, "first");
        assert_eq!(first.task.about, "a");
        assert_eq!(first.task.created, fixed_clock());
        assert!(!first.task.completed);
        assert!(matches!(first.write, WriteOutcome::Persisted));
        assert_eq!(repo.next_id(), 2);
    }

    #[test]
    fn create_with_blank_title_changes_nothing() {
        let mut repo = repo();
        for title in ["", "   ", "\n\t"] {
            let err = repo.create(title, "about").unwrap_err();
            assert_eq!(err, RepoError::Validation(TaskValidationError::EmptyTitle));
        }
        assert!(repo.is_empty());
        assert_eq!(repo.next_id(), 0);
        assert_eq!(repo.store().kv().write_count(), 0);
    }

    #[test]
    fn update_with_same_values_issues_no_write() {
        let mut repo = repo();
        let id = repo.create("title", "about").unwrap().task.id;
        let writes_before = repo.store().kv().write_count();

        let outcome = repo.update(id, " title ", "about ").unwrap();
        assert!(matches!(outcome, WriteOutcome::Unchanged));
        assert_eq!(repo.store().kv().write_count(), writes_before);
    }

    #[test]
    fn update_replaces_text_and_keeps_other_fields() {
        let mut repo = repo();
        let id = repo.create("title", "about").unwrap().task.id;
        repo.toggle_completed(id);

        let outcome = repo.update(id, "new title", "new about").unwrap();
        assert!(matches!(outcome, WriteOutcome::Persisted));

        let task = repo.get(id).unwrap();
        assert_eq!(task.title, "new title");
        assert_eq!(task.about, "new about");
        assert_eq!(task.created, fixed_clock());
        assert!(task.completed);
    }

    #[test]
    fn update_rejects_blank_title() {
        let mut repo = repo();
        let id = repo.create("title", "").unwrap().task.id;
        assert!(repo.update(id, "  ", "x").is_err());
        assert_eq!(repo.get(id).unwrap().title, "title");
    }

    #[test]
    fn update_of_unknown_id_with_blank_title_is_noop() {
        let mut repo = repo();
        repo.create("only", "").unwrap();

        let outcome = repo.update(42, "   ", "").unwrap();
        assert!(matches!(outcome, WriteOutcome::Unchanged));
        assert_eq!(repo.store().kv().write_count(), 1);
    }

    #[test]
    fn create_at_max_counter_is_rejected_without_mutation() {
        let max = i64::MAX.to_string();
        let kv = MemoryKvStore::with_items([("taskId", max.as_str())]);
        let mut repo = TaskRepository::initialize_with_clock(kv, fixed_clock);
        assert_eq!(repo.next_id(), i64::MAX);

        let err = repo.create("a", "").unwrap_err();
        assert_eq!(err, RepoError::IdSpaceExhausted(i64::MAX));
        assert!(repo.is_empty());
        assert_eq!(repo.next_id(), i64::MAX);
        assert_eq!(repo.store().kv().write_count(), 0);
    }

    #[test]
    fn last_allocatable_id_is_issued_once() {
        let start = (i64::MAX - 1).to_string();
        let kv = MemoryKvStore::with_items([("taskId", start.as_str())]);
        let mut repo = TaskRepository::initialize_with_clock(kv, fixed_clock);

        let created = repo.create("last", "").unwrap();
        assert_eq!(created.task.id, i64::MAX - 1);
        assert_eq!(repo.next_id(), i64::MAX);
        assert!(repo.create("one more", "").is_err());

        let reopened = TaskRepository::initialize(repo.into_store());
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.next_id(), i64::MAX);
    }

    #[test]
    fn max_id_record_is_dropped_on_load() {
        let kv = MemoryKvStore::with_items([(
            TASK_COLLECTION_KEY,
            r#"[{"id":9223372036854775807,"title":"edge","about":"","created":1},
                {"id":2,"title":"kept","about":"","created":2}]"#,
        )]);
        let repo = TaskRepository::initialize(kv);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(2).unwrap().title, "kept");
        assert_eq!(repo.next_id(), 3);
    }

    #[test]
    fn unknown_ids_are_noops() {
        let mut repo = repo();
        repo.create("only", "").unwrap();
        let writes_before = repo.store().kv().write_count();

        assert!(matches!(
            repo.update(42, "x", "y").unwrap(),
            WriteOutcome::Unchanged
        ));
        assert!(matches!(repo.delete(42), WriteOutcome::Unchanged));
        assert!(matches!(repo.toggle_completed(42), WriteOutcome::Unchanged));
        assert_eq!(repo.store().kv().write_count(), writes_before);
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn delete_keeps_order_and_never_reuses_id() {
        let mut repo = repo();
        for title in ["a", "b", "c"] {
            repo.create(title, "").unwrap();
        }

        assert!(repo.delete(1).is_changed());
        let ids: Vec<_> = repo.list().iter().map(|task| task.id).collect();
        assert_eq!(ids, vec![0, 2]);

        repo.delete(0);
        repo.delete(2);
        assert!(repo.is_empty());

        let next = repo.create("d", "").unwrap();
        assert_eq!(next.task.id, 3);
    }

    #[test]
    fn toggle_twice_restores_state_and_order() {
        let mut repo = repo();
        repo.create("a", "").unwrap();
        repo.create("b", "").unwrap();
        let before = repo.list();

        repo.toggle_completed(0);
        assert!(repo.get(0).unwrap().completed);
        repo.toggle_completed(0);

        assert_eq!(repo.list(), before);
    }

    #[test]
    fn list_is_a_detached_copy() {
        let mut repo = repo();
        repo.create("a", "").unwrap();

        let mut snapshot = repo.list();
        snapshot[0].title = "mutated".to_string();
        snapshot.clear();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(0).unwrap().title, "a");
    }

    #[test]
    fn write_failure_keeps_in_memory_change() {
        let mut kv = MemoryKvStore::new();
        kv.set_fail_writes(true);
        let mut repo = TaskRepository::initialize_with_clock(kv, fixed_clock);

        let created = repo.create("offline", "").unwrap();
        assert!(matches!(
            created.write.warning(),
            Some(StoreError::Unavailable(_))
        ));
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.next_id(), 1);

        let toggled = repo.toggle_completed(created.task.id);
        assert!(toggled.is_changed());
        assert!(toggled.warning().is_some());
        assert!(repo.get(created.task.id).unwrap().completed);
    }

    #[test]
    fn malformed_collection_falls_back_to_empty() {
        let kv = MemoryKvStore::with_items([(TASK_COLLECTION_KEY, "\u{0}garbage")]);
        let repo = TaskRepository::initialize(kv);
        assert!(repo.list().is_empty());
        assert_eq!(repo.next_id(), 0);
    }

    #[test]
    fn counter_behind_collection_is_healed_on_load() {
        let kv = MemoryKvStore::with_items([
            (
                TASK_COLLECTION_KEY,
                r#"[{"id":0,"title":"a","about":"","created":1,"completed":false},
                    {"id":5,"title":"b","about":"","created":2,"completed":true}]"#,
            ),
            ("taskId", "2"),
        ]);
        let mut repo = TaskRepository::initialize(kv);
        assert_eq!(repo.next_id(), 6);
        assert_eq!(repo.create("c", "").unwrap().task.id, 6);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let kv = MemoryKvStore::with_items([(
            TASK_COLLECTION_KEY,
            r#"[{"id":1,"title":"first","about":"","created":1},
                {"id":1,"title":"second","about":"","created":2}]"#,
        )]);
        let repo = TaskRepository::initialize(kv);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(1).unwrap().title, "first");
    }

    #[test]
    fn invalid_loaded_records_are_trimmed_or_dropped() {
        let kv = MemoryKvStore::with_items([(
            TASK_COLLECTION_KEY,
            r#"[{"id":0,"title":"  padded ","about":" x ","created":1},
                {"id":1,"title":"   ","about":"","created":2},
                {"id":-4,"title":"negative","about":"","created":3}]"#,
        )]);
        let repo = TaskRepository::initialize(kv);
        let tasks = repo.list();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "padded");
        assert_eq!(tasks[0].about, "x");
        assert_eq!(repo.next_id(), 1);
    }

    #[test]
    fn listeners_receive_changes_until_unsubscribed() {
        let mut repo = repo();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = repo.subscribe(Arc::new(move |change: &TaskChange| {
            sink.lock().unwrap().push(*change);
        }));

        let id = repo.create("a", "").unwrap().task.id;
        repo.toggle_completed(id);
        repo.update(id, "a", "").unwrap();
        repo.update(id, "b", "").unwrap();
        repo.reload();
        assert!(repo.unsubscribe(subscription));
        repo.delete(id);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                TaskChange::Created(id),
                TaskChange::Toggled {
                    id,
                    completed: true
                },
                TaskChange::Updated(id),
                TaskChange::Loaded { count: 1 },
            ]
        );
        assert!(!repo.unsubscribe(subscription));
    }

    #[test]
    fn reload_reads_back_persisted_state() {
        let mut repo = repo();
        repo.create("a", "").unwrap();
        repo.toggle_completed(0);
        let expected = repo.list();

        let kv = repo.into_store();
        assert!(kv.get_item(TASK_COLLECTION_KEY).unwrap().is_some());
        let mut reopened = TaskRepository::initialize(kv);
        assert_eq!(reopened.list(), expected);
        assert_eq!(reopened.next_id(), 1);

        reopened.reload();
        assert_eq!(reopened.list(), expected);
    }
}
