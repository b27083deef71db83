//! Task store: durable keyed task records.
//!
//! The pipeline relies only on single-row atomicity; there are no
//! transactions across calls. Backends:
//! - `SqliteTaskStore`: local database file (default)
//! - `SupabaseTaskStore`: hosted PostgREST table
//! - `MemoryTaskStore`: in-process, for tests and throwaway servers

pub mod memory;
pub mod sqlite;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::adapters::TransportError;
use crate::config::StoreSettings;
use crate::domain::{NewTask, TaskFilter, TaskRecord, TaskUpdate};

pub use memory::MemoryTaskStore;
pub use sqlite::SqliteTaskStore;
pub use supabase::SupabaseTaskStore;

/// Errors from the task store
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Remote store error: {0}")]
    Remote(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store worker failed: {0}")]
    Worker(String),
}

/// Durable keyed task records
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Insert a new task (not completed, not archived)
    async fn insert(&self, task: NewTask) -> Result<TaskRecord, PersistenceError>;

    /// Apply a partial update by id
    async fn update(&self, id: &str, update: TaskUpdate) -> Result<TaskRecord, PersistenceError>;

    /// Delete by id
    async fn delete(&self, id: &str) -> Result<(), PersistenceError>;

    /// List tasks matching the filter, newest first
    async fn list(&self, filter: TaskFilter) -> Result<Vec<TaskRecord>, PersistenceError>;

    /// Archive every completed task that is not archived yet; returns the count
    async fn archive_completed(&self) -> Result<usize, PersistenceError>;
}

/// Open the store selected by configuration.
///
/// Supabase wins when both its URL and key are set; otherwise the local
/// SQLite file is used.
pub fn open(settings: &StoreSettings) -> Result<Arc<dyn TaskStore>, PersistenceError> {
    if let Some(supabase) = settings.supabase() {
        info!(url = %supabase.url, "Using Supabase task store");
        return Ok(Arc::new(SupabaseTaskStore::new(supabase)));
    }

    info!(path = %settings.sqlite_path.display(), "Using SQLite task store");
    Ok(Arc::new(SqliteTaskStore::open(&settings.sqlite_path)?))
}
