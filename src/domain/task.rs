//! Task records as held by the task store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of the placeholder text stored when a voice note could not be transcribed
pub const FAILED_VOICE_PREFIX: &str = "[Voice note - transcription failed: ";

/// Build the diagnostic placeholder text for a failed voice note
pub fn failed_voice_text(reason: &str) -> String {
    format!("{}{}]", FAILED_VOICE_PREFIX, reason)
}

/// A persisted task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub archived: bool,
    pub source: TaskSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Whether this record is a placeholder for a failed voice note
    pub fn is_failed_voice_note(&self) -> bool {
        self.text.starts_with(FAILED_VOICE_PREFIX)
    }
}

/// Where a task came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// Chat-bot webhook
    #[serde(alias = "telegram")]
    Chat,

    /// Direct upload from the mobile app
    #[serde(alias = "app")]
    Direct,
}

impl TaskSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for TaskSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" | "telegram" => Ok(Self::Chat),
            "direct" | "app" => Ok(Self::Direct),
            other => Err(format!("unknown task source: {}", other)),
        }
    }
}

/// Fields supplied when inserting a task
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub text: String,
    pub source: TaskSource,
    pub origin_message_id: Option<String>,
}

impl NewTask {
    pub fn new(text: impl Into<String>, source: TaskSource) -> Self {
        Self {
            text: text.into(),
            source,
            origin_message_id: None,
        }
    }

    pub fn with_origin_message(mut self, message_id: Option<String>) -> Self {
        self.origin_message_id = message_id;
        self
    }
}

/// Partial update applied by id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

impl TaskUpdate {
    pub fn completed(value: bool) -> Self {
        Self {
            completed: Some(value),
            ..Default::default()
        }
    }

    pub fn archived(value: bool) -> Self {
        Self {
            archived: Some(value),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed.is_none() && self.archived.is_none()
    }
}

/// Filter for listing tasks. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub archived: Option<bool>,
    pub completed: Option<bool>,
}

impl TaskFilter {
    /// Tasks that are still visible in the main list
    pub fn active() -> Self {
        Self {
            archived: Some(false),
            completed: None,
        }
    }

    pub fn archived() -> Self {
        Self {
            archived: Some(true),
            completed: None,
        }
    }

    pub fn matches(&self, task: &TaskRecord) -> bool {
        self.archived.map_or(true, |a| task.archived == a)
            && self.completed.map_or(true, |c| task.completed == c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_voice_text() {
        assert_eq!(
            failed_voice_text("empty transcription"),
            "[Voice note - transcription failed: empty transcription]"
        );
    }

    #[test]
    fn test_source_accepts_legacy_names() {
        let chat: TaskSource = serde_json::from_str("\"telegram\"").unwrap();
        let direct: TaskSource = serde_json::from_str("\"app\"").unwrap();
        assert_eq!(chat, TaskSource::Chat);
        assert_eq!(direct, TaskSource::Direct);
        assert_eq!(serde_json::to_string(&chat).unwrap(), "\"chat\"");
    }

    #[test]
    fn test_filter_matching() {
        let task = TaskRecord {
            id: "1".to_string(),
            text: "x".to_string(),
            completed: true,
            archived: false,
            source: TaskSource::Chat,
            origin_message_id: None,
            created_at: Utc::now(),
        };

        assert!(TaskFilter::default().matches(&task));
        assert!(TaskFilter::active().matches(&task));
        assert!(!TaskFilter::archived().matches(&task));
        assert!(!TaskFilter {
            archived: None,
            completed: Some(false)
        }
        .matches(&task));
    }
}
