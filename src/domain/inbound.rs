//! Inbound events from the chat transport.
//!
//! Telegram delivers updates as JSON envelopes. Only the `message` field is
//! relevant here; everything else (edited messages, callbacks, channel posts)
//! is ignored.

use serde::Deserialize;
use thiserror::Error;

/// A single inbound note, consumed exactly once by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Plain text message
    Text {
        body: String,
        origin_id: String,
        message_id: Option<String>,
    },

    /// Voice message referencing a file held by the transport
    Voice {
        file_ref: String,
        origin_id: String,
        message_id: Option<String>,
        duration_hint: Option<u32>,
        size_hint: Option<u64>,
    },
}

impl InboundEvent {
    /// Reply destination for this event
    pub fn origin_id(&self) -> &str {
        match self {
            Self::Text { origin_id, .. } | Self::Voice { origin_id, .. } => origin_id,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Voice { .. } => "voice",
        }
    }

    /// Parse a raw Telegram update body.
    ///
    /// Returns `Ok(None)` for well-formed updates that carry nothing to ingest.
    pub fn from_update_json(body: &[u8]) -> Result<Option<Self>, ValidationError> {
        let update: TelegramUpdate = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedPayload(e.to_string()))?;
        Self::from_update(update)
    }

    /// Convert a parsed update into an event
    pub fn from_update(update: TelegramUpdate) -> Result<Option<Self>, ValidationError> {
        let Some(message) = update.message else {
            return Ok(None);
        };

        let origin_id = message.chat.id.to_string();
        let message_id = Some(message.message_id.to_string());

        if let Some(voice) = message.voice {
            if voice.file_id.trim().is_empty() {
                return Err(ValidationError::MissingFileId);
            }
            return Ok(Some(Self::Voice {
                file_ref: voice.file_id,
                origin_id,
                message_id,
                duration_hint: voice.duration,
                size_hint: voice.file_size,
            }));
        }

        match message.text {
            Some(text) => Ok(Some(Self::Text {
                body: text,
                origin_id,
                message_id,
            })),
            None => Ok(None),
        }
    }
}

/// Telegram update envelope
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<TelegramVoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramVoice {
    pub file_id: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Malformed inbound payloads
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Voice message has no file_id")]
    MissingFileId,

    #[error("No audio file provided")]
    MissingAudio,

    #[error("Audio file is empty")]
    EmptyAudio,

    #[error("Audio file exceeds {limit} bytes")]
    AudioTooLarge { limit: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_update() {
        let body = br#"{"update_id":1,"message":{"message_id":42,"chat":{"id":777},"text":"buy milk"}}"#;
        let event = InboundEvent::from_update_json(body).unwrap().unwrap();

        assert_eq!(
            event,
            InboundEvent::Text {
                body: "buy milk".to_string(),
                origin_id: "777".to_string(),
                message_id: Some("42".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_voice_update() {
        let body = br#"{"message":{"message_id":9,"chat":{"id":-100},"voice":{"file_id":"AwAD","duration":4,"file_size":5120}}}"#;
        let event = InboundEvent::from_update_json(body).unwrap().unwrap();

        match event {
            InboundEvent::Voice {
                file_ref,
                origin_id,
                duration_hint,
                size_hint,
                ..
            } => {
                assert_eq!(file_ref, "AwAD");
                assert_eq!(origin_id, "-100");
                assert_eq!(duration_hint, Some(4));
                assert_eq!(size_hint, Some(5120));
            }
            other => panic!("expected voice event, got {:?}", other),
        }
    }

    #[test]
    fn test_update_without_message_is_ignored() {
        let body = br#"{"update_id":5,"edited_message":{"message_id":1}}"#;
        assert_eq!(InboundEvent::from_update_json(body).unwrap(), None);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let result = InboundEvent::from_update_json(b"{not json");
        assert!(matches!(result, Err(ValidationError::MalformedPayload(_))));
    }

    #[test]
    fn test_voice_without_file_id_is_rejected() {
        let body = br#"{"message":{"message_id":1,"chat":{"id":1},"voice":{"file_id":"  "}}}"#;
        assert_eq!(
            InboundEvent::from_update_json(body),
            Err(ValidationError::MissingFileId)
        );
    }
}
