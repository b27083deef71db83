//! OpenAI audio transcription adapter.
//!
//! Uploads the staged file to `/v1/audio/transcriptions` as multipart form
//! data. No language is forced; the service auto-detects it, which does
//! better on short or non-English clips.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{content_type_for, StagedAudio};

use super::{ResponseFormat, Segment, SpeechResponse, SpeechToText, TransportError};

const SERVICE: &str = "openai";

/// Configuration for the transcription adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key; calls fail fast when absent
    pub api_key: Option<String>,
    /// API base URL (without trailing slash)
    pub api_base: String,
    /// Transcription model
    pub model: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Request-level retries for throttling and server errors
    pub max_request_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            timeout: Duration::from_secs(120),
            max_request_retries: 2,
        }
    }
}

/// `verbose_json` response body
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<Segment>,
}

/// Speech-to-text over the OpenAI HTTP API
pub struct OpenAiTranscriber {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiTranscriber {
    pub fn new(config: OpenAiConfig) -> Self {
        if let Some(key) = config.api_key.as_deref() {
            if !key.is_empty() && !key.starts_with("sk-") {
                warn!("OPENAI_API_KEY does not start with \"sk-\" - may be invalid");
            }
        }

        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> Result<&str, TransportError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(TransportError::MissingCredential("OPENAI_API_KEY"))
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.config.api_base)
    }

    /// One HTTP request with a fresh read handle on the staged file
    async fn send_once(
        &self,
        api_key: &str,
        audio: &StagedAudio,
        format: ResponseFormat,
    ) -> Result<SpeechResponse, TransportError> {
        let file = tokio::fs::File::open(audio.path())
            .await
            .map_err(|e| TransportError::StagedAudio(e.to_string()))?;

        let part = Part::stream_with_length(file, audio.len())
            .file_name(audio.file_name().to_string())
            .mime_str(content_type_for(audio.file_name()))
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        let form = Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", format.as_str())
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .timeout(self.config.timeout)
            .multipart(form)
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
            });
        }

        match format {
            ResponseFormat::Text => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| TransportError::from_reqwest(SERVICE, e))?;
                Ok(SpeechResponse::text(text))
            }
            ResponseFormat::VerboseJson => {
                let body: VerboseTranscription = response
                    .json()
                    .await
                    .map_err(|e| TransportError::from_reqwest(SERVICE, e))?;
                Ok(SpeechResponse {
                    text: body.text,
                    segments: body.segments,
                })
            }
        }
    }
}

/// Statuses the service documents as safe to resend
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 429) || status >= 500
}

/// Short backoff between request-level retries
fn request_retry_delay(retry: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(retry.saturating_sub(1).min(4)))
}

#[async_trait]
impl SpeechToText for OpenAiTranscriber {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn transcribe(
        &self,
        audio: &StagedAudio,
        format: ResponseFormat,
    ) -> Result<SpeechResponse, TransportError> {
        let api_key = self.api_key()?;
        let mut retries = 0u32;

        loop {
            debug!(
                model = %self.config.model,
                format = format.as_str(),
                bytes = audio.len(),
                "Submitting audio for transcription"
            );

            match self.send_once(api_key, audio, format).await {
                Err(TransportError::Rejected { status, .. })
                    if is_retryable_status(status) && retries < self.config.max_request_retries =>
                {
                    retries += 1;
                    let delay = request_retry_delay(retries);
                    warn!(
                        status,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        "Transcription request throttled, resending"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
