//! Domain types for voicetask.
//!
//! This module contains the core data structures:
//! - Inbound: Events delivered by the chat transport
//! - Audio: Payloads, staging files, transcription outcomes
//! - Task: Records held by the task store

pub mod audio;
pub mod inbound;
pub mod task;

// Re-export commonly used types
pub use audio::{content_type_for, AudioPayload, StagedAudio, TranscriptionOutcome};
pub use inbound::{InboundEvent, TelegramUpdate, ValidationError};
pub use task::{failed_voice_text, NewTask, TaskFilter, TaskRecord, TaskSource, TaskUpdate};
