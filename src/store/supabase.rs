//! Supabase (PostgREST) task store.
//!
//! Talks to the `tasks` table with the service-role key. Column names
//! follow the hosted schema (`telegram_message_id`, sources `telegram`/`app`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::TransportError;
use crate::domain::{NewTask, TaskFilter, TaskRecord, TaskSource, TaskUpdate};

use super::{PersistenceError, TaskStore};

const SERVICE: &str = "supabase";

/// Connection settings for the hosted store
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: String,
    pub timeout: Duration,
}

/// Row as stored in the hosted table
#[derive(Debug, Deserialize)]
struct TaskRow {
    id: serde_json::Value,
    text: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    archived: Option<bool>,
    source: String,
    #[serde(default)]
    telegram_message_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_record(self) -> Result<TaskRecord, PersistenceError> {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        let source = self
            .source
            .parse::<TaskSource>()
            .map_err(|e| PersistenceError::Remote(TransportError::Decode(e)))?;

        Ok(TaskRecord {
            id,
            text: self.text,
            completed: self.completed,
            archived: self.archived.unwrap_or(false),
            source,
            origin_message_id: self.telegram_message_id,
            created_at: self.created_at,
        })
    }
}

/// Insert body for the hosted table
#[derive(Debug, Serialize)]
struct NewRow<'a> {
    text: &'a str,
    completed: bool,
    source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    telegram_message_id: Option<&'a str>,
}

/// Source names used by the hosted schema
fn hosted_source(source: TaskSource) -> &'static str {
    match source {
        TaskSource::Chat => "telegram",
        TaskSource::Direct => "app",
    }
}

/// PostgREST filter for a single id
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

/// Task store over the Supabase REST API
pub struct SupabaseTaskStore {
    config: SupabaseConfig,
    client: reqwest::Client,
}

impl SupabaseTaskStore {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/tasks", self.config.url.trim_end_matches('/'))
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .timeout(self.config.timeout)
    }

    /// Send a request that returns rows (`Prefer: return=representation`)
    async fn rows(&self, builder: reqwest::RequestBuilder) -> Result<Vec<TaskRecord>, PersistenceError> {
        let response = builder
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let rows: Vec<TaskRow> = response
            .json()
            .await
            .map_err(|e| TransportError::from_reqwest(SERVICE, e))?;

        rows.into_iter().map(TaskRow::into_record).collect()
    }

    fn first(id: &str, rows: Vec<TaskRecord>) -> Result<TaskRecord, PersistenceError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }
}

/// Query pairs for a list filter
fn filter_query(filter: &TaskFilter) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("select", "*".to_string()),
        ("order", "created_at.desc".to_string()),
    ];
    if let Some(archived) = filter.archived {
        query.push(("archived", eq(archived)));
    }
    if let Some(completed) = filter.completed {
        query.push(("completed", eq(completed)));
    }
    query
}

#[async_trait]
impl TaskStore for SupabaseTaskStore {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn insert(&self, task: NewTask) -> Result<TaskRecord, PersistenceError> {
        let row = NewRow {
            text: &task.text,
            completed: false,
            source: hosted_source(task.source),
            telegram_message_id: task.origin_message_id.as_deref(),
        };

        let rows = self
            .rows(self.request(reqwest::Method::POST).json(&row))
            .await?;
        rows.into_iter().next().ok_or_else(|| {
            TransportError::Decode("insert returned no rows".to_string()).into()
        })
    }

    async fn update(&self, id: &str, update: TaskUpdate) -> Result<TaskRecord, PersistenceError> {
        let rows = self
            .rows(
                self.request(reqwest::Method::PATCH)
                    .query(&[("id", eq(id))])
                    .json(&update),
            )
            .await?;
        Self::first(id, rows)
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let rows = self
            .rows(self.request(reqwest::Method::DELETE).query(&[("id", eq(id))]))
            .await?;
        Self::first(id, rows).map(|_| ())
    }

    async fn list(&self, filter: TaskFilter) -> Result<Vec<TaskRecord>, PersistenceError> {
        self.rows(self.request(reqwest::Method::GET).query(&filter_query(&filter)))
            .await
    }

    async fn archive_completed(&self) -> Result<usize, PersistenceError> {
        let rows = self
            .rows(
                self.request(reqwest::Method::PATCH)
                    .query(&[("completed", eq(true)), ("archived", eq(false))])
                    .json(&TaskUpdate::archived(true)),
            )
            .await?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_mapping() {
        let body = r#"[{"id":"7f6c","text":"buy milk","completed":false,"archived":null,"source":"telegram","telegram_message_id":"55","created_at":"2026-03-01T10:00:00.123+00:00"}]"#;
        let rows: Vec<TaskRow> = serde_json::from_str(body).unwrap();
        let record = rows.into_iter().next().unwrap().into_record().unwrap();

        assert_eq!(record.id, "7f6c");
        assert_eq!(record.source, TaskSource::Chat);
        assert!(!record.archived);
        assert_eq!(record.origin_message_id.as_deref(), Some("55"));
    }

    #[test]
    fn test_numeric_ids_are_stringified() {
        let body = r#"{"id":42,"text":"x","completed":true,"source":"app","created_at":"2026-03-01T10:00:00Z"}"#;
        let row: TaskRow = serde_json::from_str(body).unwrap();
        let record = row.into_record().unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.source, TaskSource::Direct);
    }

    #[test]
    fn test_filter_query() {
        let query = filter_query(&TaskFilter::active());
        assert!(query.contains(&("archived", "eq.false".to_string())));
        assert!(!query.iter().any(|(k, _)| *k == "completed"));
    }

    #[test]
    fn test_table_url_trims_slash() {
        let store = SupabaseTaskStore::new(SupabaseConfig {
            url: "https://abc.supabase.co/".to_string(),
            service_key: "key".to_string(),
            timeout: Duration::from_secs(10),
        });
        assert_eq!(store.table_url(), "https://abc.supabase.co/rest/v1/tasks");
    }

    #[test]
    fn test_insert_body_uses_hosted_names() {
        let row = NewRow {
            text: "hi",
            completed: false,
            source: hosted_source(TaskSource::Chat),
            telegram_message_id: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["source"], "telegram");
        assert!(json.get("telegram_message_id").is_none());
    }
}
