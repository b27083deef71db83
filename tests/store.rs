//! Task Store Integration Tests
//!
//! SQLite store against a real database file.

use tempfile::TempDir;

use voicetask::domain::{NewTask, TaskFilter, TaskSource, TaskUpdate};
use voicetask::store::{PersistenceError, SqliteTaskStore, TaskStore};

fn temp_store() -> (SqliteTaskStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SqliteTaskStore::open(&dir.path().join("nested").join("tasks.db")).unwrap();
    (store, dir)
}

#[tokio::test]
async fn test_crud_cycle() {
    let (store, _dir) = temp_store();

    let task = store
        .insert(NewTask::new("renew library card", TaskSource::Direct))
        .await
        .unwrap();
    assert!(!task.completed);
    assert!(!task.archived);

    let updated = store
        .update(
            &task.id,
            TaskUpdate {
                text: Some("renew library card today".into()),
                completed: Some(true),
                archived: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.text, "renew library card today");
    assert!(updated.completed);
    assert!(!updated.archived);
    assert_eq!(updated.created_at, task.created_at);

    store.delete(&task.id).await.unwrap();
    assert!(store.list(TaskFilter::default()).await.unwrap().is_empty());

    let err = store.delete(&task.id).await.unwrap_err();
    assert!(matches!(err, PersistenceError::NotFound(_)));
}

#[tokio::test]
async fn test_list_is_newest_first_and_filtered() {
    let (store, _dir) = temp_store();

    let first = store.insert(NewTask::new("first", TaskSource::Chat)).await.unwrap();
    let second = store.insert(NewTask::new("second", TaskSource::Chat)).await.unwrap();
    let third = store.insert(NewTask::new("third", TaskSource::Direct)).await.unwrap();

    let all = store.list(TaskFilter::default()).await.unwrap();
    let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![third.id.as_str(), second.id.as_str(), first.id.as_str()]);

    store.update(&second.id, TaskUpdate::completed(true)).await.unwrap();
    let completed = store
        .list(TaskFilter {
            archived: None,
            completed: Some(true),
        })
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, second.id);
}

#[tokio::test]
async fn test_archive_completed() {
    let (store, _dir) = temp_store();

    let done = store.insert(NewTask::new("done", TaskSource::Chat)).await.unwrap();
    store.insert(NewTask::new("open", TaskSource::Chat)).await.unwrap();
    store.update(&done.id, TaskUpdate::completed(true)).await.unwrap();

    assert_eq!(store.archive_completed().await.unwrap(), 1);
    assert_eq!(store.archive_completed().await.unwrap(), 0);

    let active = store.list(TaskFilter::active()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].text, "open");

    let archived = store.list(TaskFilter::archived()).await.unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].id, done.id);
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tasks.db");

    let id = {
        let store = SqliteTaskStore::open(&path).unwrap();
        store
            .insert(
                NewTask::new("[Voice note - transcription failed: empty transcription]", TaskSource::Chat)
                    .with_origin_message(Some("901".into())),
            )
            .await
            .unwrap()
            .id
    };

    let store = SqliteTaskStore::open(&path).unwrap();
    let tasks = store.list(TaskFilter::default()).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, id);
    assert!(tasks[0].is_failed_voice_note());
    assert_eq!(tasks[0].source, TaskSource::Chat);
    assert_eq!(tasks[0].origin_message_id.as_deref(), Some("901"));
}
