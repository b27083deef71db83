//! Telegram Bot API adapter.
//!
//! Resolves voice file references (`getFile`), downloads the audio, and
//! sends plain-text replies (`sendMessage`). The bot token is part of every
//! URL, so URLs never reach the logs.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AudioSource, Notifier, TransportError};

const SERVICE: &str = "telegram";

/// Configuration for the Telegram client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; calls fail fast when absent
    pub bot_token: Option<String>,
    /// API base URL
    pub api_base: String,
    /// Timeout for `getFile`
    pub metadata_timeout: Duration,
    /// Timeout for the file download
    pub download_timeout: Duration,
    /// Timeout for `sendMessage`
    pub notify_timeout: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: "https://api.telegram.org".to_string(),
            metadata_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            notify_timeout: Duration::from_secs(15),
        }
    }
}

/// Telegram Bot API client
pub struct TelegramClient {
    config: TelegramConfig,
    /// HTTP client
    client: reqwest::Client,
}

/// Response from Telegram API
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Result of `getFile`
#[derive(Debug, Deserialize)]
struct FileResult {
    file_path: Option<String>,
}

/// Message result from sendMessage
#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

impl TelegramClient {
    /// Create from config
    pub fn from_config(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn token(&self) -> Result<&str, TransportError> {
        self.config
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(TransportError::MissingCredential("TELEGRAM_BOT_TOKEN"))
    }

    /// Build API URL
    fn api_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base, token, method)
    }

    /// Build file download URL
    fn file_url(&self, token: &str, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.config.api_base, token, file_path)
    }

    /// Send a text message
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<i64, TransportError> {
        let token = self.token()?;
        let url = self.api_url(token, "sendMessage");

        let response = self
            .client
            .post(&url)
            .timeout(self.config.notify_timeout)
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(SERVICE, e.without_url()))?;

        let status = response.status().as_u16();
        let result: TelegramResponse<MessageResult> = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.without_url().to_string()))?;

        if !result.ok {
            return Err(TransportError::Rejected {
                service: SERVICE,
                status,
                body: result.description.unwrap_or_default(),
            });
        }

        Ok(result.result.map(|r| r.message_id).unwrap_or(0))
    }
}

#[async_trait]
impl AudioSource for TelegramClient {
    async fn resolve(&self, file_ref: &str) -> Result<Option<String>, TransportError> {
        let token = self.token()?;
        let url = self.api_url(token, "getFile");
        debug!(file_id = %file_ref, "Requesting file info from Telegram");

        let response = self
            .client
            .get(&url)
            .query(&[("file_id", file_ref)])
            .timeout(self.config.metadata_timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(SERVICE, e.without_url()))?;

        let status = response.status().as_u16();
        let result: TelegramResponse<FileResult> = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.without_url().to_string()))?;

        if !result.ok {
            return Err(TransportError::Rejected {
                service: SERVICE,
                status,
                body: result
                    .description
                    .unwrap_or_else(|| "getFile returned ok=false".to_string()),
            });
        }

        Ok(result.result.and_then(|r| r.file_path))
    }

    async fn download(&self, location: &str, max_bytes: u64) -> Result<Vec<u8>, TransportError> {
        let token = self.token()?;
        let url = self.file_url(token, location);
        info!(file_path = %location, "Downloading voice file from Telegram");

        let response = self
            .client
            .get(&url)
            .timeout(self.config.download_timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(SERVICE, e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                body: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(TransportError::TooLarge { limit: max_bytes });
        }

        let mut buffer = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::from_reqwest(SERVICE, e.without_url()))?;
            if (buffer.len() + chunk.len()) as u64 > max_bytes {
                return Err(TransportError::TooLarge { limit: max_bytes });
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer)
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_message(&self, origin_id: &str, text: &str) -> Result<(), TransportError> {
        TelegramClient::send_message(self, origin_id, text)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_token(token: Option<&str>) -> TelegramClient {
        TelegramClient::from_config(TelegramConfig {
            bot_token: token.map(String::from),
            ..Default::default()
        })
    }

    #[test]
    fn test_api_url() {
        let client = client_with_token(Some("TOKEN"));
        assert_eq!(
            client.api_url("TOKEN", "sendMessage"),
            "https://api.telegram.org/botTOKEN/sendMessage"
        );
        assert_eq!(
            client.file_url("TOKEN", "voice/file_3.oga"),
            "https://api.telegram.org/file/botTOKEN/voice/file_3.oga"
        );
    }

    #[tokio::test]
    async fn test_missing_token_fails_fast() {
        let client = client_with_token(None);
        let err = client.resolve("file").await.unwrap_err();
        assert_eq!(err, TransportError::MissingCredential("TELEGRAM_BOT_TOKEN"));

        let empty = client_with_token(Some(""));
        assert!(matches!(
            empty.download("voice/a.oga", 10).await,
            Err(TransportError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_get_file_response_parsing() {
        let body = r#"{"ok":true,"result":{"file_id":"x","file_unique_id":"y","file_size":10,"file_path":"voice/file_1.oga"}}"#;
        let parsed: TelegramResponse<FileResult> = serde_json::from_str(body).unwrap();
        assert!(parsed.ok);
        assert_eq!(
            parsed.result.and_then(|r| r.file_path),
            Some("voice/file_1.oga".to_string())
        );

        let error = r#"{"ok":false,"error_code":400,"description":"Bad Request: invalid file_id"}"#;
        let parsed: TelegramResponse<FileResult> = serde_json::from_str(error).unwrap();
        assert!(!parsed.ok);
        assert_eq!(
            parsed.description.as_deref(),
            Some("Bad Request: invalid file_id")
        );
    }
}
