//! Core ingestion logic.
//!
//! This module contains:
//! - Retry: bounded exponential backoff for transient failures
//! - Fetcher: voice file retrieval
//! - Transcription: staged upload with segment fallback
//! - Notify: best-effort chat replies
//! - Orchestrator: the fetch, transcribe, persist state machine

pub mod fetcher;
pub mod notify;
pub mod orchestrator;
pub mod retry;
pub mod transcription;

// Re-export commonly used types
pub use fetcher::{audio_digest, AudioFetcher, RetrievalError};
pub use notify::{saved_reply, NotificationSink, FAILURE_REPLY};
pub use orchestrator::{
    DirectTranscription, DirectUploadError, IngestionOrchestrator, IngestionOutcome,
    IngestionReport, EMPTY_TRANSCRIPTION,
};
pub use retry::{retry_with_backoff, RetryError, RetryPolicy, RetryState};
pub use transcription::{TranscriptionClient, TranscriptionError};
