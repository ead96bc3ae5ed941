use std::collections::HashSet;
use std::path::Path;
use taskpad_core::{
    KeyValueStore, MemoryKvStore, RepoError, SqliteKvStore, Task, TaskRepository, TaskStore,
    TaskValidationError, WriteOutcome, TASK_COLLECTION_KEY, TASK_COUNTER_KEY,
};

fn open_file_repo(path: &Path) -> TaskRepository<SqliteKvStore> {
    TaskRepository::initialize(SqliteKvStore::open(path).unwrap())
}

#[test]
fn create_then_reload_restores_the_same_task() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskpad.sqlite3");

    let created = {
        let mut repo = open_file_repo(&path);
        assert!(repo.list().is_empty());

        let created = repo.create("Buy milk", "2%").unwrap();
        assert!(matches!(created.write, WriteOutcome::Persisted));

        let listed = repo.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, 0);
        assert_eq!(listed[0].title, "Buy milk");
        assert_eq!(listed[0].about, "2%");
        assert!(!listed[0].completed);
        created.task
    };

    let repo = open_file_repo(&path);
    assert_eq!(repo.list(), vec![created]);
    assert_eq!(repo.next_id(), 1);
}

#[test]
fn ids_are_distinct_and_strictly_increasing() {
    let mut repo = TaskRepository::initialize(MemoryKvStore::new());

    let mut ids = Vec::new();
    for n in 0..25 {
        let created = repo.create(&format!("task {n}"), "").unwrap();
        ids.push(created.task.id);
        if n % 3 == 0 {
            repo.delete(created.task.id);
        }
    }

    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
}

#[test]
fn deleted_ids_are_not_reused_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskpad.sqlite3");

    {
        let mut repo = open_file_repo(&path);
        let id = repo.create("temporary", "").unwrap().task.id;
        assert!(repo.delete(id).is_changed());
        assert!(repo.list().iter().all(|task| task.id != id));
    }

    let mut repo = open_file_repo(&path);
    assert!(repo.is_empty());
    assert_eq!(repo.create("next", "").unwrap().task.id, 1);
}

#[test]
fn blank_titles_never_mutate_the_collection() {
    let mut repo = TaskRepository::initialize(MemoryKvStore::new());
    repo.create("keep", "").unwrap();
    let before = repo.list();

    for title in ["", "   "] {
        let err = repo.create(title, "about").unwrap_err();
        assert!(matches!(
            err,
            RepoError::Validation(TaskValidationError::EmptyTitle)
        ));
    }
    assert_eq!(repo.list(), before);
}

#[test]
fn unchanged_update_writes_nothing_to_sqlite_store() {
    let mut repo = TaskRepository::initialize(SqliteKvStore::open_in_memory().unwrap());
    let id = repo.create("same", "text").unwrap().task.id;

    let stamp = |repo: &TaskRepository<SqliteKvStore>| -> i64 {
        repo.store()
            .kv()
            .connection()
            .query_row(
                "SELECT total_changes();",
                [],
                |row| row.get(0),
            )
            .unwrap()
    };
    let before = stamp(&repo);
    assert!(matches!(
        repo.update(id, "same", "text").unwrap(),
        WriteOutcome::Unchanged
    ));
    assert_eq!(stamp(&repo), before);

    assert!(repo.update(id, "changed", "text").unwrap().is_changed());
    assert!(stamp(&repo) > before);
}

#[test]
fn malformed_collection_recovers_to_empty_list() {
    let mut kv = SqliteKvStore::open_in_memory().unwrap();
    kv.set_item(TASK_COLLECTION_KEY, "[{\"id\": 1, \"title\":").unwrap();
    kv.set_item(TASK_COUNTER_KEY, "7").unwrap();

    let mut repo = TaskRepository::initialize(kv);
    assert!(repo.list().is_empty());
    assert_eq!(repo.next_id(), 7);

    // The next write replaces the corrupt value.
    repo.create("fresh start", "").unwrap();
    let store = TaskStore::new(repo.into_store());
    assert_eq!(store.load_collection().unwrap().len(), 1);
}

#[test]
fn malformed_counter_falls_back_to_collection_floor() {
    let kv = MemoryKvStore::with_items([
        (
            TASK_COLLECTION_KEY,
            r#"[{"id":3,"title":"kept","about":"","created":10,"completed":false}]"#,
        ),
        (TASK_COUNTER_KEY, "three"),
    ]);

    let repo = TaskRepository::initialize(kv);
    assert_eq!(repo.len(), 1);
    assert_eq!(repo.next_id(), 4);
}

#[test]
fn legacy_records_without_completed_flag_load_as_open() {
    let kv = MemoryKvStore::with_items([(
        TASK_COLLECTION_KEY,
        r#"[{"id":0,"title":"legacy","about":"old","created":1690000000000}]"#,
    )]);

    let repo = TaskRepository::initialize(kv);
    assert_eq!(
        repo.list(),
        vec![Task {
            id: 0,
            title: "legacy".to_string(),
            about: "old".to_string(),
            created: 1_690_000_000_000,
            completed: false,
        }]
    );
}

#[test]
fn toggle_pair_restores_flag_and_persists_each_step() {
    let mut repo = TaskRepository::initialize(MemoryKvStore::new());
    for title in ["a", "b", "c"] {
        repo.create(title, "").unwrap();
    }
    let before = repo.list();
    let writes = repo.store().kv().write_count();

    assert!(matches!(repo.toggle_completed(1), WriteOutcome::Persisted));
    let stored = repo.store().load_collection().unwrap();
    assert!(stored[1].completed);

    assert!(matches!(repo.toggle_completed(1), WriteOutcome::Persisted));
    assert_eq!(repo.list(), before);
    assert_eq!(repo.store().kv().write_count(), writes + 2);
}

#[test]
fn failed_writes_are_warnings_and_memory_state_stands() {
    let mut kv = MemoryKvStore::new();
    kv.set_fail_writes(true);
    let mut repo = TaskRepository::initialize(kv);

    let created = repo.create("unsaved", "").unwrap();
    assert!(created.write.warning().is_some());
    assert!(repo.update(created.task.id, "edited", "").unwrap().warning().is_some());
    assert_eq!(repo.get(created.task.id).unwrap().title, "edited");

    let mut kv = repo.into_store();
    kv.set_fail_writes(false);
    let reopened = TaskRepository::initialize(kv);
    assert!(reopened.is_empty());
}
