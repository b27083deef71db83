//! Adapter interfaces for external systems.
//!
//! Adapters wrap the remote services the pipeline talks to: the chat
//! transport (file retrieval and replies) and the speech-to-text service.

pub mod openai;
pub mod telegram;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::StagedAudio;

// Re-export the concrete adapters
pub use openai::OpenAiTranscriber;
pub use telegram::{TelegramClient, TelegramConfig};

/// Errors raised at a network boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{service} rejected request ({status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Payload exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("{0} is missing from environment variables")]
    MissingCredential(&'static str),

    #[error("Staged audio unavailable: {0}")]
    StagedAudio(String),
}

impl TransportError {
    /// Network-class failures worth retrying. Application-level rejections
    /// fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_) | Self::Network(_))
    }

    /// Classify a reqwest error
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_decode() || err.is_body() {
            // A connection dropped mid-body surfaces here too
            if is_malformed_body(&err) {
                Self::Decode(err.to_string())
            } else {
                Self::Network(err.to_string())
            }
        } else if let Some(status) = err.status() {
            Self::Rejected {
                service,
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Whether a body failure came from parsing rather than from the connection
fn is_malformed_body(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause.is::<serde_json::Error>() {
            return true;
        }
        if cause.is::<std::io::Error>() {
            return false;
        }
        source = cause.source();
    }
    false
}

/// Resolves voice file references to bytes (two sequential calls)
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Resolve a file reference to a download location.
    ///
    /// `Ok(None)` means the service answered but gave no location.
    async fn resolve(&self, file_ref: &str) -> Result<Option<String>, TransportError>;

    /// Download the bytes at a resolved location, refusing more than `max_bytes`
    async fn download(&self, location: &str, max_bytes: u64) -> Result<Vec<u8>, TransportError>;
}

/// Sends plain-text replies back to the originating chat
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, origin_id: &str, text: &str) -> Result<(), TransportError>;
}

/// Response format requested from the speech-to-text service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Plain text body
    Text,

    /// JSON with timestamped segments
    VerboseJson,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::VerboseJson => "verbose_json",
        }
    }
}

/// A timed transcript segment
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

/// What the speech-to-text service returned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechResponse {
    pub text: String,
    pub segments: Vec<Segment>,
}

impl SpeechResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            segments: Vec::new(),
        }
    }

    pub fn segments<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: String::new(),
            segments: texts
                .into_iter()
                .map(|t| Segment {
                    text: t.into(),
                    ..Default::default()
                })
                .collect(),
        }
    }

    /// Segment texts in order, single-space joined. Falls back to the
    /// top-level text when there are no segments.
    pub fn joined_segments(&self) -> String {
        if self.segments.is_empty() {
            return self.text.trim().to_string();
        }

        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Speech-to-text transport
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Submit the staged file. Implementations open their own read handle
    /// and close it before returning.
    async fn transcribe(
        &self,
        audio: &StagedAudio,
        format: ResponseFormat,
    ) -> Result<SpeechResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Timeout("t".into()).is_transient());
        assert!(TransportError::Connect("refused".into()).is_transient());
        assert!(TransportError::Network("reset".into()).is_transient());

        assert!(!TransportError::MissingCredential("OPENAI_API_KEY").is_transient());
        assert!(!TransportError::Rejected {
            service: "openai",
            status: 401,
            body: "invalid key".into()
        }
        .is_transient());
        assert!(!TransportError::Decode("bad json".into()).is_transient());
    }

    #[test]
    fn test_joined_segments() {
        let response = SpeechResponse::segments([" hello", "world ", "  "]);
        assert_eq!(response.joined_segments(), "hello world");

        let text_only = SpeechResponse::text("  just text ");
        assert_eq!(text_only.joined_segments(), "just text");
    }
}
