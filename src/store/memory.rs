//! In-process task store.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{NewTask, TaskFilter, TaskRecord, TaskUpdate};

use super::{PersistenceError, TaskStore};

/// Task store backed by a vector; contents are lost on exit
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<Vec<TaskRecord>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tasks<T>(
        &self,
        f: impl FnOnce(&mut Vec<TaskRecord>) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| PersistenceError::Worker("task list mutex poisoned".to_string()))?;
        f(&mut tasks)
    }

    /// Snapshot of every stored task in insertion order
    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.with_tasks(|tasks| Ok(tasks.clone()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, task: NewTask) -> Result<TaskRecord, PersistenceError> {
        let record = TaskRecord {
            id: Uuid::new_v4().to_string(),
            text: task.text,
            completed: false,
            archived: false,
            source: task.source,
            origin_message_id: task.origin_message_id,
            created_at: Utc::now(),
        };

        self.with_tasks(|tasks| {
            tasks.push(record.clone());
            Ok(record)
        })
    }

    async fn update(&self, id: &str, update: TaskUpdate) -> Result<TaskRecord, PersistenceError> {
        self.with_tasks(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;

            if let Some(text) = update.text {
                task.text = text;
            }
            if let Some(completed) = update.completed {
                task.completed = completed;
            }
            if let Some(archived) = update.archived {
                task.archived = archived;
            }

            Ok(task.clone())
        })
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.with_tasks(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| t.id != id);
            if tasks.len() == before {
                return Err(PersistenceError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    async fn list(&self, filter: TaskFilter) -> Result<Vec<TaskRecord>, PersistenceError> {
        self.with_tasks(|tasks| {
            // Insertion order is creation order; reverse for newest first.
            Ok(tasks
                .iter()
                .rev()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect())
        })
    }

    async fn archive_completed(&self) -> Result<usize, PersistenceError> {
        self.with_tasks(|tasks| {
            let mut count = 0;
            for task in tasks.iter_mut().filter(|t| t.completed && !t.archived) {
                task.archived = true;
                count += 1;
            }
            Ok(count)
        })
    }
}
