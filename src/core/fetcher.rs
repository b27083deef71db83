//! Voice file retrieval.
//!
//! Two sequential calls: resolve the reference to a download location,
//! then download the bytes. No retries here; a failed retrieval fails the
//! enclosing ingestion attempt.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, instrument};

use crate::adapters::{AudioSource, TransportError};
use crate::domain::{content_type_for, AudioPayload};

/// Errors fetching audio from the chat transport
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Could not resolve voice file: {0}")]
    Resolve(#[source] TransportError),

    #[error("Voice file has no download location")]
    MissingLocation,

    #[error("Download failed: {0}")]
    Download(#[source] TransportError),

    #[error("Downloaded audio buffer is empty")]
    Empty,
}

/// Resolves voice references to audio payloads
pub struct AudioFetcher {
    source: Arc<dyn AudioSource>,
    max_bytes: u64,
}

impl AudioFetcher {
    pub fn new(source: Arc<dyn AudioSource>, max_bytes: u64) -> Self {
        Self { source, max_bytes }
    }

    /// Fetch the audio behind a file reference
    #[instrument(skip(self), fields(file_id = %file_ref))]
    pub async fn fetch(&self, file_ref: &str) -> Result<AudioPayload, RetrievalError> {
        let location = self
            .source
            .resolve(file_ref)
            .await
            .map_err(RetrievalError::Resolve)?
            .filter(|l| !l.is_empty())
            .ok_or(RetrievalError::MissingLocation)?;

        let bytes = self
            .source
            .download(&location, self.max_bytes)
            .await
            .map_err(RetrievalError::Download)?;

        if bytes.is_empty() {
            return Err(RetrievalError::Empty);
        }

        info!(
            bytes = bytes.len(),
            digest = %audio_digest(&bytes),
            "Downloaded voice file"
        );

        Ok(AudioPayload::new(bytes, content_type_for(&location)))
    }
}

/// Short content digest for correlating logs (first 12 hex chars of SHA256)
pub fn audio_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..6])
}
