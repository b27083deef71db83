//! Transcription with segment fallback and transient-failure retries.
//!
//! Each call stages the payload to a temporary file, asks for plain text,
//! and falls back to the segment format when the text comes back empty.
//! The staged file is removed on every exit path.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{ResponseFormat, SpeechToText, TransportError};
use crate::domain::{AudioPayload, StagedAudio, TranscriptionOutcome};

use super::retry::{retry_with_backoff, RetryError, RetryPolicy};

/// Errors raised when transcription cannot produce an outcome
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Audio buffer is empty")]
    EmptyAudio,

    #[error("Failed to stage audio: {0}")]
    Staging(#[from] std::io::Error),

    #[error("{last} (after {attempts} attempts)")]
    Exhausted {
        attempts: u32,
        #[source]
        last: TransportError,
    },

    #[error("{0}")]
    Rejected(#[source] TransportError),
}

/// Submits audio to the speech-to-text backend
pub struct TranscriptionClient {
    backend: Arc<dyn SpeechToText>,
    policy: RetryPolicy,
    staging_dir: Option<PathBuf>,
}

impl TranscriptionClient {
    pub fn new(backend: Arc<dyn SpeechToText>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            staging_dir: None,
        }
    }

    /// Stage audio under a specific directory instead of the system temp dir
    pub fn with_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = dir;
        self
    }

    /// Transcribe a payload.
    ///
    /// Empty results are an outcome, not an error.
    #[instrument(skip(self, payload), fields(backend = self.backend.name(), bytes = payload.len()))]
    pub async fn transcribe(
        &self,
        payload: &AudioPayload,
    ) -> Result<TranscriptionOutcome, TranscriptionError> {
        if payload.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        let staged = StagedAudio::stage(payload, self.staging_dir.as_deref()).await?;
        debug!(path = %staged.path().display(), "Staged audio for upload");

        let result = retry_with_backoff(&self.policy, TransportError::is_transient, |attempt| {
            self.attempt(&staged, attempt)
        })
        .await;

        let path = staged.path().to_path_buf();
        if let Err(e) = staged.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove staged audio");
        }

        match result {
            Ok(outcome) => {
                if let TranscriptionOutcome::Transcribed(ref text) = outcome {
                    info!(chars = text.chars().count(), "Transcription successful");
                }
                Ok(outcome)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(attempts, error = %last, "Transcription retries exhausted");
                Err(TranscriptionError::Exhausted { attempts, last })
            }
            Err(RetryError::Permanent { error, .. }) => {
                warn!(error = %error, "Transcription rejected");
                Err(TranscriptionError::Rejected(error))
            }
        }
    }

    /// Transcribe a payload, folding errors into [`TranscriptionOutcome::Failed`]
    /// with the error text as the cause.
    pub async fn outcome(&self, payload: &AudioPayload) -> TranscriptionOutcome {
        match self.transcribe(payload).await {
            Ok(outcome) => outcome,
            Err(e) => TranscriptionOutcome::Failed(e.to_string()),
        }
    }

    /// Plain text first, then the segment format if the text is empty
    async fn attempt(
        &self,
        staged: &StagedAudio,
        attempt: u32,
    ) -> Result<TranscriptionOutcome, TransportError> {
        debug!(attempt, "Requesting plain-text transcription");
        let primary = self.backend.transcribe(staged, ResponseFormat::Text).await?;

        let outcome = TranscriptionOutcome::from_text(&primary.text);
        if outcome != TranscriptionOutcome::Empty {
            return Ok(outcome);
        }

        warn!(attempt, "Empty plain-text transcription, retrying with segments");
        let verbose = self
            .backend
            .transcribe(staged, ResponseFormat::VerboseJson)
            .await?;

        Ok(TranscriptionOutcome::from_text(&verbose.joined_segments()))
    }
}
