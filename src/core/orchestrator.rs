//! Ingestion orchestrator.
//!
//! Sequences fetch, transcribe and persist for both input channels. On the
//! chat channel every voice event ends in exactly one stored task: the
//! transcript on success, a diagnostic placeholder otherwise.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{
    failed_voice_text, AudioPayload, InboundEvent, NewTask, TaskRecord, TaskSource,
    TranscriptionOutcome, ValidationError,
};
use crate::store::{PersistenceError, TaskStore};

use super::fetcher::AudioFetcher;
use super::notify::{saved_reply, NotificationSink, FAILURE_REPLY};
use super::transcription::TranscriptionClient;

/// Failure reason recorded when the service produced no text
pub const EMPTY_TRANSCRIPTION: &str = "empty transcription";

/// Stages of the voice path
#[derive(Debug)]
enum VoiceStage {
    Fetching,
    Transcribing(AudioPayload),
    Failing(String),
    Persisting { text: String, transcribed: bool },
}

/// What happened to one inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionOutcome {
    /// Nothing to store (blank text)
    Ignored,

    /// Stored from text or a transcript
    Saved(TaskRecord),

    /// Stored as a failed-voice placeholder
    Placeholder(TaskRecord),
}

/// Result of ingesting one chat event
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionReport {
    pub outcome: IngestionOutcome,
    /// Whether the reply was accepted by the transport
    pub acknowledged: bool,
}

impl IngestionReport {
    pub fn task(&self) -> Option<&TaskRecord> {
        match &self.outcome {
            IngestionOutcome::Ignored => None,
            IngestionOutcome::Saved(task) | IngestionOutcome::Placeholder(task) => Some(task),
        }
    }
}

/// Errors on the direct upload path, surfaced to the caller
#[derive(Debug, Error)]
pub enum DirectUploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Transcription returned empty text")]
    EmptyTranscription,

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result of a direct upload
#[derive(Debug, Clone, PartialEq)]
pub struct DirectTranscription {
    pub transcription: String,
    pub saved: Option<TaskRecord>,
}

/// Drives inbound events through the pipeline
pub struct IngestionOrchestrator {
    fetcher: AudioFetcher,
    transcriber: TranscriptionClient,
    store: Arc<dyn TaskStore>,
    notifications: NotificationSink,
}

impl IngestionOrchestrator {
    pub fn new(
        fetcher: AudioFetcher,
        transcriber: TranscriptionClient,
        store: Arc<dyn TaskStore>,
        notifications: NotificationSink,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            store,
            notifications,
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Ingest one chat event.
    ///
    /// Only a store failure is returned; every other failure becomes a
    /// placeholder task.
    #[instrument(skip(self, event), fields(kind = event.kind(), chat_id = %event.origin_id()))]
    pub async fn ingest(&self, event: InboundEvent) -> Result<IngestionReport, PersistenceError> {
        match event {
            InboundEvent::Text {
                body,
                origin_id,
                message_id,
            } => self.ingest_text(&body, &origin_id, message_id).await,
            InboundEvent::Voice {
                file_ref,
                origin_id,
                message_id,
                duration_hint,
                size_hint,
            } => {
                debug!(file_id = %file_ref, ?duration_hint, ?size_hint, "Voice message received");
                self.ingest_voice(&file_ref, &origin_id, message_id).await
            }
        }
    }

    async fn ingest_text(
        &self,
        body: &str,
        origin_id: &str,
        message_id: Option<String>,
    ) -> Result<IngestionReport, PersistenceError> {
        let text = body.trim();
        if text.is_empty() {
            debug!("Ignoring blank text message");
            return Ok(IngestionReport {
                outcome: IngestionOutcome::Ignored,
                acknowledged: false,
            });
        }

        let task = self
            .store
            .insert(NewTask::new(text, TaskSource::Chat).with_origin_message(message_id))
            .await?;
        info!(task_id = %task.id, "Saved text task");

        let acknowledged = self.notifications.notify(origin_id, &saved_reply(text)).await;
        Ok(IngestionReport {
            outcome: IngestionOutcome::Saved(task),
            acknowledged,
        })
    }

    async fn ingest_voice(
        &self,
        file_ref: &str,
        origin_id: &str,
        message_id: Option<String>,
    ) -> Result<IngestionReport, PersistenceError> {
        let mut stage = VoiceStage::Fetching;

        let (text, transcribed) = loop {
            stage = match stage {
                VoiceStage::Fetching => match self.fetcher.fetch(file_ref).await {
                    Ok(payload) => VoiceStage::Transcribing(payload),
                    Err(e) => {
                        warn!(file_id = %file_ref, error = %e, "Voice retrieval failed");
                        VoiceStage::Failing(e.to_string())
                    }
                },
                VoiceStage::Transcribing(payload) => match self.transcriber.outcome(&payload).await {
                    TranscriptionOutcome::Transcribed(text) => VoiceStage::Persisting {
                        text,
                        transcribed: true,
                    },
                    TranscriptionOutcome::Empty => {
                        warn!("Empty transcription result");
                        VoiceStage::Failing(EMPTY_TRANSCRIPTION.to_string())
                    }
                    TranscriptionOutcome::Failed(cause) => {
                        error!(error = %cause, "Transcription failed");
                        VoiceStage::Failing(cause)
                    }
                },
                VoiceStage::Failing(reason) => VoiceStage::Persisting {
                    text: failed_voice_text(&reason),
                    transcribed: false,
                },
                VoiceStage::Persisting { text, transcribed } => break (text, transcribed),
            };
        };

        let task = self
            .store
            .insert(NewTask::new(text, TaskSource::Chat).with_origin_message(message_id))
            .await?;

        let (outcome, reply) = if transcribed {
            info!(task_id = %task.id, "Saved voice task");
            let reply = saved_reply(&task.text);
            (IngestionOutcome::Saved(task), reply)
        } else {
            warn!(task_id = %task.id, "Saved failed voice note placeholder");
            (IngestionOutcome::Placeholder(task), FAILURE_REPLY.to_string())
        };

        let acknowledged = self.notifications.notify(origin_id, &reply).await;
        Ok(IngestionReport {
            outcome,
            acknowledged,
        })
    }

    /// Transcribe an uploaded file and optionally store it.
    ///
    /// Runs inside the request; nothing is stored when transcription fails.
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn ingest_direct(
        &self,
        payload: AudioPayload,
        save: bool,
    ) -> Result<DirectTranscription, DirectUploadError> {
        if payload.is_empty() {
            return Err(ValidationError::EmptyAudio.into());
        }

        let transcription = match self.transcriber.outcome(&payload).await {
            TranscriptionOutcome::Transcribed(text) => text,
            TranscriptionOutcome::Empty => return Err(DirectUploadError::EmptyTranscription),
            TranscriptionOutcome::Failed(cause) => return Err(DirectUploadError::Failed(cause)),
        };
        drop(payload);

        let saved = if save {
            let task = self
                .store
                .insert(NewTask::new(transcription.as_str(), TaskSource::Direct))
                .await?;
            info!(task_id = %task.id, "Saved uploaded task");
            Some(task)
        } else {
            None
        };

        Ok(DirectTranscription {
            transcription,
            saved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        AudioSource, Notifier, ResponseFormat, SpeechResponse, SpeechToText, TransportError,
    };
    use crate::core::RetryPolicy;
    use crate::domain::StagedAudio;
    use crate::store::MemoryTaskStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OneFile;

    #[async_trait]
    impl AudioSource for OneFile {
        async fn resolve(&self, _file_ref: &str) -> Result<Option<String>, TransportError> {
            Ok(Some("voice/file_1.oga".into()))
        }

        async fn download(&self, _location: &str, _max: u64) -> Result<Vec<u8>, TransportError> {
            Ok(b"OggS-bytes".to_vec())
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl SpeechToText for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn transcribe(
            &self,
            _audio: &StagedAudio,
            _format: ResponseFormat,
        ) -> Result<SpeechResponse, TransportError> {
            Ok(SpeechResponse::text(self.0))
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl Notifier for Outbox {
        async fn send_message(&self, origin_id: &str, text: &str) -> Result<(), TransportError> {
            self.0.lock().unwrap().push((origin_id.into(), text.into()));
            Ok(())
        }
    }

    fn orchestrator(text: &'static str) -> (IngestionOrchestrator, Arc<MemoryTaskStore>, Arc<Outbox>) {
        let store = Arc::new(MemoryTaskStore::new());
        let outbox = Arc::new(Outbox::default());
        let orchestrator = IngestionOrchestrator::new(
            AudioFetcher::new(Arc::new(OneFile), 1024),
            TranscriptionClient::new(Arc::new(Fixed(text)), RetryPolicy::default()),
            store.clone(),
            NotificationSink::new(outbox.clone()),
        );
        (orchestrator, store, outbox)
    }

    #[tokio::test]
    async fn test_blank_text_is_ignored() {
        let (orchestrator, store, outbox) = orchestrator("unused");
        let report = orchestrator
            .ingest(InboundEvent::Text {
                body: "  \n ".into(),
                origin_id: "1".into(),
                message_id: Some("2".into()),
            })
            .await
            .unwrap();

        assert_eq!(report.outcome, IngestionOutcome::Ignored);
        assert!(store.snapshot().is_empty());
        assert!(outbox.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_voice_success_replies_with_transcript() {
        let (orchestrator, store, outbox) = orchestrator(" call the dentist ");
        let report = orchestrator
            .ingest(InboundEvent::Voice {
                file_ref: "abc".into(),
                origin_id: "99".into(),
                message_id: Some("7".into()),
                duration_hint: Some(3),
                size_hint: None,
            })
            .await
            .unwrap();

        assert!(report.acknowledged);
        assert_eq!(report.task().unwrap().text, "call the dentist");
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(
            outbox.0.lock().unwrap()[0],
            ("99".to_string(), "✅ Saved: call the dentist".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_transcription_becomes_placeholder() {
        let (orchestrator, store, outbox) = orchestrator("   ");
        let report = orchestrator
            .ingest(InboundEvent::Voice {
                file_ref: "abc".into(),
                origin_id: "99".into(),
                message_id: None,
                duration_hint: None,
                size_hint: None,
            })
            .await
            .unwrap();

        assert!(matches!(report.outcome, IngestionOutcome::Placeholder(_)));
        let tasks = store.snapshot();
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].text,
            "[Voice note - transcription failed: empty transcription]"
        );
        assert_eq!(outbox.0.lock().unwrap()[0].1, FAILURE_REPLY);
    }

    #[tokio::test]
    async fn test_direct_upload_without_save() {
        let (orchestrator, store, _) = orchestrator("hello");
        let result = orchestrator
            .ingest_direct(AudioPayload::new(vec![1, 2, 3], "audio/m4a"), false)
            .await
            .unwrap();

        assert_eq!(result.transcription, "hello");
        assert!(result.saved.is_none());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_direct_empty_transcription_is_an_error() {
        let (orchestrator, store, _) = orchestrator("");
        let err = orchestrator
            .ingest_direct(AudioPayload::new(vec![1, 2, 3], "audio/m4a"), true)
            .await
            .unwrap_err();

        assert!(matches!(err, DirectUploadError::EmptyTranscription));
        assert!(store.snapshot().is_empty());
    }
}
