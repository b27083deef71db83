//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use voicetask::adapters::{
    AudioSource, Notifier, ResponseFormat, SpeechResponse, SpeechToText, TransportError,
};
use voicetask::core::{
    AudioFetcher, IngestionOrchestrator, NotificationSink, RetryPolicy, TranscriptionClient,
};
use voicetask::domain::StagedAudio;
use voicetask::server::AppState;
use voicetask::store::MemoryTaskStore;

pub const MAX_AUDIO_BYTES: u64 = 50 * 1024 * 1024;

/// Audio source with scripted answers and call counters
pub struct FakeSource {
    resolve: Result<Option<String>, TransportError>,
    download: Result<Vec<u8>, TransportError>,
    pub resolve_calls: Mutex<u32>,
    pub download_calls: Mutex<u32>,
}

impl FakeSource {
    pub fn ok(bytes: &[u8]) -> Arc<Self> {
        Self::scripted(Ok(Some("voice/file_0.oga".to_string())), Ok(bytes.to_vec()))
    }

    pub fn scripted(
        resolve: Result<Option<String>, TransportError>,
        download: Result<Vec<u8>, TransportError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            resolve,
            download,
            resolve_calls: Mutex::new(0),
            download_calls: Mutex::new(0),
        })
    }

    pub fn resolves(&self) -> u32 {
        *self.resolve_calls.lock().unwrap()
    }

    pub fn downloads(&self) -> u32 {
        *self.download_calls.lock().unwrap()
    }
}

#[async_trait]
impl AudioSource for FakeSource {
    async fn resolve(&self, _file_ref: &str) -> Result<Option<String>, TransportError> {
        *self.resolve_calls.lock().unwrap() += 1;
        self.resolve.clone()
    }

    async fn download(&self, _location: &str, _max_bytes: u64) -> Result<Vec<u8>, TransportError> {
        *self.download_calls.lock().unwrap() += 1;
        self.download.clone()
    }
}

/// One recorded speech-to-text call
#[derive(Debug, Clone)]
pub struct SpeechCall {
    pub format: ResponseFormat,
    pub at: Instant,
    pub staged_path: std::path::PathBuf,
}

/// Speech-to-text backend answering from a queue
pub struct ScriptedSpeech {
    responses: Mutex<VecDeque<Result<SpeechResponse, TransportError>>>,
    pub calls: Mutex<Vec<SpeechCall>>,
}

impl ScriptedSpeech {
    pub fn new(responses: Vec<Result<SpeechResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn text(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(SpeechResponse::text(text))])
    }

    pub fn calls(&self) -> Vec<SpeechCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechToText for ScriptedSpeech {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn transcribe(
        &self,
        audio: &StagedAudio,
        format: ResponseFormat,
    ) -> Result<SpeechResponse, TransportError> {
        self.calls.lock().unwrap().push(SpeechCall {
            format,
            at: Instant::now(),
            staged_path: audio.path().to_path_buf(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Decode("no scripted response".into())))
    }
}

/// Notifier that records every reply, optionally failing each send
#[derive(Default)]
pub struct Outbox {
    pub sent: Mutex<Vec<(String, String)>>,
    failing: bool,
}

impl Outbox {
    /// Records each reply, then reports a timeout
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            ..Default::default()
        })
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for Outbox {
    async fn send_message(&self, origin_id: &str, text: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((origin_id.to_string(), text.to_string()));
        if self.failing {
            return Err(timeout());
        }
        Ok(())
    }
}

/// Orchestrator wired to fakes
pub struct Harness {
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub store: Arc<MemoryTaskStore>,
    pub source: Arc<FakeSource>,
    pub speech: Arc<ScriptedSpeech>,
    pub outbox: Arc<Outbox>,
}

impl Harness {
    pub fn new(source: Arc<FakeSource>, speech: Arc<ScriptedSpeech>) -> Self {
        Self::with_outbox(source, speech, Arc::new(Outbox::default()))
    }

    pub fn with_outbox(
        source: Arc<FakeSource>,
        speech: Arc<ScriptedSpeech>,
        outbox: Arc<Outbox>,
    ) -> Self {
        let store = Arc::new(MemoryTaskStore::new());

        let orchestrator = IngestionOrchestrator::new(
            AudioFetcher::new(source.clone(), MAX_AUDIO_BYTES),
            TranscriptionClient::new(speech.clone(), RetryPolicy::default()),
            store.clone(),
            NotificationSink::new(outbox.clone()),
        );

        Self {
            orchestrator: Arc::new(orchestrator),
            store,
            source,
            speech,
            outbox,
        }
    }

    pub fn app_state(&self, secret: Option<&str>) -> AppState {
        AppState::new(
            self.orchestrator.clone(),
            secret.map(String::from),
            MAX_AUDIO_BYTES,
        )
    }
}

pub fn timeout() -> TransportError {
    TransportError::Timeout("operation timed out".into())
}
