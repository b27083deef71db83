//! voicetask - voice notes in, tasks out
//!
//! Ingests short notes from a Telegram bot webhook and a mobile app upload,
//! transcribes voice notes, and stores each note as a task.
//!
//! # Architecture
//!
//! The voice path is a small state machine:
//! - Fetch the audio from the chat transport
//! - Transcribe it, retrying transient failures with backoff
//! - Persist the transcript, or a placeholder describing the failure
//! - Reply to the chat (best effort)
//!
//! Every voice note on the chat channel ends in exactly one stored task.
//!
//! # Modules
//!
//! - `adapters`: External system integrations (Telegram, OpenAI)
//! - `core`: Ingestion logic (retry, fetcher, transcription, orchestrator)
//! - `domain`: Data structures (InboundEvent, AudioPayload, TaskRecord)
//! - `store`: Task store backends (SQLite, Supabase, memory)
//! - `server`: HTTP routes (webhook, upload, health)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the service
//! voicetask serve --bind 0.0.0.0:3000
//!
//! # Transcribe a local file and save it as a task
//! voicetask transcribe memo.m4a --save
//!
//! # List open tasks
//! voicetask tasks list
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod store;

// Re-export main types at crate root for convenience
pub use core::{IngestionOrchestrator, RetryPolicy, TranscriptionClient};
pub use domain::{AudioPayload, InboundEvent, TaskRecord, TranscriptionOutcome};
pub use store::TaskStore;

// Telegram integration
pub use adapters::{TelegramClient, TelegramConfig};
