//! Audio payloads and transcription outcomes.

use std::io;
use std::path::Path;

use tempfile::TempPath;

/// Raw audio bytes plus their declared content type.
///
/// Owned by a single ingestion attempt and dropped when it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl AudioPayload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension matching the content type (the transcription
    /// service sniffs the format from the file name)
    pub fn extension(&self) -> &'static str {
        extension_for(&self.content_type)
    }
}

/// Result of a transcription attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionOutcome {
    /// Non-empty transcript
    Transcribed(String),

    /// The service answered but produced no text
    Empty,

    /// The service could not be used
    Failed(String),
}

impl TranscriptionOutcome {
    /// Classify raw service text, trimming surrounding whitespace
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            Self::Transcribed(trimmed.to_string())
        }
    }
}

/// Audio written to a temporary file for upload.
///
/// The file is removed when this value is dropped or closed.
#[derive(Debug)]
pub struct StagedAudio {
    path: TempPath,
    file_name: String,
    len: u64,
}

impl StagedAudio {
    /// Write the payload to a fresh temporary file
    pub async fn stage(payload: &AudioPayload, dir: Option<&Path>) -> io::Result<Self> {
        let suffix = format!(".{}", payload.extension());
        let mut builder = tempfile::Builder::new();
        builder.prefix("voicetask-").suffix(&suffix);

        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        // Keep only the path; readers open their own handles.
        let path = file.into_temp_path();

        tokio::fs::write(&path, &payload.bytes).await?;

        Ok(Self {
            path,
            file_name: format!("voice{}", suffix),
            len: payload.bytes.len() as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    /// Remove the file, reporting errors instead of ignoring them
    pub fn close(self) -> io::Result<()> {
        self.path.close()
    }
}

/// Guess a content type from a file path or name
pub fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "oga" | "ogg" | "opus" => "audio/ogg",
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// File extension for a content type (defaults to ogg, the chat transport's voice format)
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/webm" => "webm",
        "audio/flac" => "flac",
        _ => "ogg",
    }
}
