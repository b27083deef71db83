//! Command-line interface for voicetask.
//!
//! Provides commands for running the HTTP service, transcribing a local
//! file through the direct-upload path, maintaining the task store, and
//! inspecting resolved configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{mask_secret, Settings};
use crate::domain::{content_type_for, AudioPayload};
use crate::server::{self, AppState};
use crate::store::{self, MemoryTaskStore, TaskStore};

pub mod tasks;

/// voicetask - voice notes in, tasks out
#[derive(Parser, Debug)]
#[command(name = "voicetask")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the webhook and upload service
    Serve {
        /// Address to bind to (overrides PORT / VOICETASK_BIND)
        #[arg(short, long)]
        bind: Option<String>,

        /// Keep tasks in memory instead of the configured store
        #[arg(long)]
        ephemeral: bool,
    },

    /// Transcribe a local audio file
    Transcribe {
        /// Audio file to transcribe
        file: PathBuf,

        /// Save the transcript as a task
        #[arg(long)]
        save: bool,
    },

    /// Task store maintenance
    Tasks {
        #[command(subcommand)]
        command: tasks::TaskCommands,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load()?;

        match self.command {
            Commands::Serve { bind, ephemeral } => serve(settings, bind, ephemeral).await,
            Commands::Transcribe { file, save } => transcribe_file(&settings, &file, save).await,
            Commands::Tasks { command } => {
                let store = store::open(&settings.store)?;
                tasks::execute(command, store.as_ref()).await
            }
            Commands::Config => show_config(&settings),
        }
    }
}

/// Run the HTTP service
async fn serve(settings: Settings, bind: Option<String>, ephemeral: bool) -> Result<()> {
    let bind = bind.unwrap_or_else(|| settings.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;

    let store: Arc<dyn TaskStore> = if ephemeral {
        info!("Using in-memory task store");
        Arc::new(MemoryTaskStore::new())
    } else {
        store::open(&settings.store)?
    };

    let state = AppState::from_settings(&settings, store);
    server::serve(addr, state).await
}

/// Run the direct-upload path on a local file
async fn transcribe_file(settings: &Settings, path: &Path, save: bool) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read audio file: {}", path.display()))?;

    let content_type = content_type_for(&path.to_string_lossy());
    let payload = AudioPayload::new(bytes, content_type);

    // Skip opening the store when nothing will be saved
    let store: Arc<dyn TaskStore> = if save {
        store::open(&settings.store)?
    } else {
        Arc::new(MemoryTaskStore::new())
    };

    let state = AppState::from_settings(settings, store);
    let result = state
        .orchestrator
        .ingest_direct(payload, save)
        .await
        .with_context(|| format!("Failed to transcribe {}", path.display()))?;

    println!("{}", result.transcription);
    if let Some(task) = result.saved {
        eprintln!("Saved task {}", task.id);
    }

    Ok(())
}

fn show_config(settings: &Settings) -> Result<()> {
    let masked = |value: &Option<String>| {
        value
            .as_deref()
            .map(mask_secret)
            .unwrap_or_else(|| "(not set)".to_string())
    };

    println!("voicetask configuration");
    println!("{}", "=".repeat(40));
    println!(
        "Config file: {}",
        settings
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Server:");
    println!("  Bind:            {}", settings.bind);
    println!("  Webhook secret:  {}", masked(&settings.webhook_secret));
    println!("  Max audio size:  {} bytes", settings.max_audio_bytes);
    println!();
    println!("Telegram:");
    println!("  Bot token:       {}", masked(&settings.telegram.bot_token));
    println!("  API base:        {}", settings.telegram.api_base);
    println!(
        "  Timeouts:        metadata {}s, download {}s, notify {}s",
        settings.telegram.metadata_timeout.as_secs(),
        settings.telegram.download_timeout.as_secs(),
        settings.telegram.notify_timeout.as_secs()
    );
    println!();

    let openai = &settings.transcription.openai;
    let retry = &settings.transcription.retry;
    println!("Transcription:");
    println!("  API key:         {}", masked(&openai.api_key));
    println!("  API base:        {}", openai.api_base);
    println!("  Model:           {}", openai.model);
    println!("  Timeout:         {}s", openai.timeout.as_secs());
    println!("  Request retries: {}", openai.max_request_retries);
    println!(
        "  Retry policy:    {} attempts, {}ms initial, {}ms cap, x{}",
        retry.max_attempts, retry.initial_delay_ms, retry.max_delay_ms, retry.backoff_multiplier
    );
    if let Some(dir) = &settings.transcription.staging_dir {
        println!("  Staging dir:     {}", dir.display());
    }
    println!();
    println!("Store:");
    match settings.store.supabase() {
        Some(supabase) => {
            println!("  Backend:         supabase");
            println!("  URL:             {}", supabase.url);
            println!("  Service key:     {}", mask_secret(&supabase.service_key));
        }
        None => {
            println!("  Backend:         sqlite");
            println!("  Path:            {}", settings.store.sqlite_path.display());
        }
    }

    Ok(())
}
