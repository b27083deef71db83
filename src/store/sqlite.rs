//! SQLite-backed task store.
//!
//! A single connection guarded by a mutex; every call runs on the blocking
//! pool so the async runtime never waits on disk.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::domain::{NewTask, TaskFilter, TaskRecord, TaskSource, TaskUpdate};

use super::{PersistenceError, TaskStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id                TEXT PRIMARY KEY,
    text              TEXT NOT NULL,
    completed         INTEGER NOT NULL DEFAULT 0,
    archived          INTEGER NOT NULL DEFAULT 0,
    source            TEXT NOT NULL,
    origin_message_id TEXT,
    created_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS tasks_created_at ON tasks (created_at);
";

const COLUMNS: &str = "id, text, completed, archived, source, origin_message_id, created_at";

/// Task store in a local SQLite database
#[derive(Clone)]
pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// Open (or create) the database file
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Database that lives only as long as this store
    pub fn in_memory() -> Result<Self, PersistenceError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&Connection) -> Result<T, PersistenceError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| PersistenceError::Worker("connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| PersistenceError::Worker(e.to_string()))?
    }
}

/// Fixed-width timestamps so text ordering matches time ordering
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    let source: String = row.get(4)?;
    let created_at: String = row.get(6)?;

    let source = source.parse::<TaskSource>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
    })?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(TaskRecord {
        id: row.get(0)?,
        text: row.get(1)?,
        completed: row.get(2)?,
        archived: row.get(3)?,
        source,
        origin_message_id: row.get(5)?,
        created_at,
    })
}

fn fetch_task(conn: &Connection, id: &str) -> Result<Option<TaskRecord>, PersistenceError> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", COLUMNS);
    let task = conn
        .query_row(&sql, params![id], row_to_task)
        .optional()?;
    Ok(task)
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, task: NewTask) -> Result<TaskRecord, PersistenceError> {
        let record = TaskRecord {
            id: Uuid::new_v4().to_string(),
            text: task.text,
            completed: false,
            archived: false,
            source: task.source,
            origin_message_id: task.origin_message_id,
            // Stored at microsecond precision
            created_at: Utc::now().trunc_subsecs(6),
        };

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, text, completed, archived, source, origin_message_id, created_at)
                 VALUES (?1, ?2, 0, 0, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.text,
                    record.source.as_str(),
                    record.origin_message_id,
                    format_timestamp(&record.created_at),
                ],
            )?;
            Ok(record)
        })
        .await
    }

    async fn update(&self, id: &str, update: TaskUpdate) -> Result<TaskRecord, PersistenceError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks SET
                    text = COALESCE(?2, text),
                    completed = COALESCE(?3, completed),
                    archived = COALESCE(?4, archived)
                 WHERE id = ?1",
                params![id, update.text, update.completed, update.archived],
            )?;

            if changed == 0 {
                return Err(PersistenceError::NotFound(id));
            }

            fetch_task(conn, &id)?.ok_or(PersistenceError::NotFound(id))
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            if changed == 0 {
                return Err(PersistenceError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn list(&self, filter: TaskFilter) -> Result<Vec<TaskRecord>, PersistenceError> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM tasks
                 WHERE (?1 IS NULL OR archived = ?1)
                   AND (?2 IS NULL OR completed = ?2)
                 ORDER BY created_at DESC, rowid DESC",
                COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params![filter.archived, filter.completed], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn archive_completed(&self) -> Result<usize, PersistenceError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET archived = 1 WHERE completed = 1 AND archived = 0",
                [],
            )?;
            Ok(changed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let inserted = store
            .insert(NewTask::new("call mom", TaskSource::Chat).with_origin_message(Some("12".into())))
            .await
            .unwrap();

        let listed = store.list(TaskFilter::default()).await.unwrap();
        assert_eq!(listed, vec![inserted.clone()]);
        assert_eq!(listed[0].origin_message_id.as_deref(), Some("12"));
        assert!(!listed[0].completed);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let result = store.update("missing", TaskUpdate::completed(true)).await;
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2026-01-01T00:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&a).len(), format_timestamp(&b).len());
        assert!(format_timestamp(&a) < format_timestamp(&b));
    }
}
