//! HTTP surface.
//!
//! - `/telegram/*`: chat webhook (acknowledge first, process in background)
//! - `/app/*`: direct upload from the mobile app
//! - `/health`: liveness

pub mod upload;
pub mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::adapters::openai::OpenAiTranscriber;
use crate::adapters::TelegramClient;
use crate::config::Settings;
use crate::core::{AudioFetcher, IngestionOrchestrator, NotificationSink, TranscriptionClient};
use crate::store::TaskStore;

/// Headroom for multipart framing on top of the audio limit
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// State shared across routes
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub webhook_secret: Option<String>,
    pub max_audio_bytes: u64,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<IngestionOrchestrator>,
        webhook_secret: Option<String>,
        max_audio_bytes: u64,
    ) -> Self {
        Self {
            orchestrator,
            webhook_secret,
            max_audio_bytes,
        }
    }

    /// Wire the production adapters from resolved settings
    pub fn from_settings(settings: &Settings, store: Arc<dyn TaskStore>) -> Self {
        let telegram = Arc::new(TelegramClient::from_config(settings.telegram.clone()));
        let speech = Arc::new(OpenAiTranscriber::new(settings.transcription.openai.clone()));

        let orchestrator = IngestionOrchestrator::new(
            AudioFetcher::new(telegram.clone(), settings.max_audio_bytes),
            TranscriptionClient::new(speech, settings.transcription.retry.clone())
                .with_staging_dir(settings.transcription.staging_dir.clone()),
            store,
            NotificationSink::new(telegram),
        );

        Self::new(
            Arc::new(orchestrator),
            settings.webhook_secret.clone(),
            settings.max_audio_bytes,
        )
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.max_audio_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health))
        .route("/telegram/webhook", post(webhook::telegram_webhook))
        .route("/telegram/test", get(webhook::webhook_test))
        .route("/app/transcribe", post(upload::transcribe_upload))
        .route("/app/health", get(upload::app_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve until the process is stopped
#[instrument(skip(state))]
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    if state.webhook_secret.is_none() {
        warn!("TELEGRAM_WEBHOOK_SECRET is not set; webhook requests are not verified");
    }

    let app = router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("voicetask listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Handler for `GET /health`
pub async fn health() -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        timestamp: Utc::now(),
    })
}
