use chrono::{TimeZone, Utc};
use std::sync::Arc;
use threetasks_core::config::{EXPLORATION_LIST_ID, LIFE_LIST_ID, THREE_TASKS_LIST_ID};
use threetasks_core::{AppConfig, AppError, ConfigError, ManualClock, PersistenceBackend, TaskApp};

const CONFIG: &str = r#"
data_dir = "/var/lib/threetasks"

[logging]
level = "warn"

[persistence]
backend = "relational"

[[lists]]
id = "work"
title = "Work"
prepend = true

[[lists]]
id = "someday"
title = "Someday"
delete_on_complete = true
"#;

fn config_in(dir: &std::path::Path, backend: PersistenceBackend) -> AppConfig {
    let mut config = AppConfig::default();
    config.data_dir = dir.join("data");
    config.persistence.backend = backend;
    config
}

#[test]
fn toml_lists_replace_the_builtin_ones() {
    let config = AppConfig::from_toml_str(CONFIG).unwrap();

    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.persistence.backend, PersistenceBackend::Relational);
    assert_eq!(config.lists.len(), 2);
    assert!(config.list(THREE_TASKS_LIST_ID).is_none());

    let work = config.list("work").unwrap();
    assert_eq!(work.title, "Work");
    assert!(work.policy.prepend);
    assert!(!work.policy.delete_on_complete);
    assert!(config.list("someday").unwrap().policy.delete_on_complete);
}

#[test]
fn malformed_and_duplicate_list_ids_are_rejected() {
    let err = AppConfig::from_toml_str("[[lists]]\nid = \"has space\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidListId(id) if id == "has space"));

    let err =
        AppConfig::from_toml_str("[[lists]]\nid = \"a\"\n\n[[lists]]\nid = \"a\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateListId(id) if id == "a"));

    let err = AppConfig::from_toml_str("[persistence]\nbackend = \"cloud\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn load_reads_file_and_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threetasks.toml");
    std::fs::write(&path, CONFIG).unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.lists.len(), 2);

    let err = AppConfig::load(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[tokio::test]
async fn unknown_list_is_rejected() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 5, 9, 0, 0).unwrap()));
    let app = TaskApp::open_in_memory(AppConfig::default(), clock).unwrap();

    let err = app.open_list("groceries").await.err().unwrap();
    assert!(matches!(err, AppError::UnknownList(id) if id == "groceries"));
}

#[tokio::test]
async fn builtin_lists_open_with_their_policies() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 5, 9, 0, 0).unwrap()));
    let app = TaskApp::open_in_memory(AppConfig::default(), clock).unwrap();

    let three = app.open_list(THREE_TASKS_LIST_ID).await.unwrap();
    assert!(!three.snapshot().loading);
    assert!(three.policy().use_due_date_as_completion_date);
    let exploration = app.open_list(EXPLORATION_LIST_ID).await.unwrap();
    assert!(exploration.policy().delete_on_complete);
    let life = app.open_list(LIFE_LIST_ID).await.unwrap();
    assert!(life.policy().prepend);

    three.add("A", None).unwrap();
    three.flush().await;
    assert!(exploration.snapshot().tasks.is_empty());
}

#[tokio::test]
async fn tasks_persist_across_app_restarts_for_both_backends() {
    for backend in [PersistenceBackend::Local, PersistenceBackend::Relational] {
        let dir = tempfile::tempdir().unwrap();

        let app = TaskApp::open(config_in(dir.path(), backend)).unwrap();
        let store = app.open_list(THREE_TASKS_LIST_ID).await.unwrap();
        let id = store.add("Write report", None).unwrap();
        store.add("Call mom", None).unwrap();
        store.toggle(&id);
        store.flush().await;
        let expected: Vec<(String, bool)> = store
            .snapshot()
            .tasks
            .into_iter()
            .map(|task| (task.text, task.completed))
            .collect();
        drop(store);
        drop(app);

        let reopened = TaskApp::open(config_in(dir.path(), backend)).unwrap();
        let store = reopened.open_list(THREE_TASKS_LIST_ID).await.unwrap();
        let loaded: Vec<(String, bool)> = store
            .snapshot()
            .tasks
            .into_iter()
            .map(|task| (task.text, task.completed))
            .collect();
        assert_eq!(loaded, expected, "backend {backend:?}");
        assert!(dir.path().join("data").join("threetasks.sqlite3").exists());
    }
}
