//! Configuration for voicetask.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (credentials, `PORT`, `VOICETASK_*`)
//! 2. Config file (.voicetask/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .voicetask/config.yaml
//! - Relative paths in the config file resolve against the project root
//!   (the directory holding `.voicetask/`)
//!
//! Settings are resolved once at startup and passed into each component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::openai::OpenAiConfig;
use crate::adapters::TelegramConfig;
use crate::core::RetryPolicy;
use crate::store::supabase::SupabaseConfig;

/// Upper bound for a single audio file (50 MB)
pub const DEFAULT_MAX_AUDIO_BYTES: u64 = 50 * 1024 * 1024;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramFileConfig>,
    #[serde(default)]
    pub transcription: Option<TranscriptionFileConfig>,
    #[serde(default)]
    pub store: Option<StoreFileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub max_audio_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramFileConfig {
    pub api_base: Option<String>,
    pub metadata_timeout_seconds: Option<u64>,
    pub download_timeout_seconds: Option<u64>,
    pub notify_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptionFileConfig {
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_request_retries: Option<u32>,
    pub staging_dir: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreFileConfig {
    pub sqlite_path: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the HTTP server binds to
    pub bind: String,
    /// Shared secret expected in the webhook header (None = not checked)
    pub webhook_secret: Option<String>,
    /// Largest accepted audio file
    pub max_audio_bytes: u64,
    /// Chat transport
    pub telegram: TelegramConfig,
    /// Speech-to-text
    pub transcription: TranscriptionSettings,
    /// Task store
    pub store: StoreSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TranscriptionSettings {
    pub openai: OpenAiConfig,
    pub retry: RetryPolicy,
    /// Where audio is staged for upload (system temp dir when unset)
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub sqlite_path: PathBuf,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub timeout: Duration,
}

impl StoreSettings {
    /// Hosted store settings, when both URL and key are present
    pub fn supabase(&self) -> Option<SupabaseConfig> {
        match (&self.supabase_url, &self.supabase_key) {
            (Some(url), Some(key)) => Some(SupabaseConfig {
                url: url.clone(),
                service_key: key.clone(),
                timeout: self.timeout,
            }),
            _ => None,
        }
    }
}

impl Settings {
    /// Load settings from the config file (if any) and the process environment
    pub fn load() -> Result<Self> {
        let config_file = find_config_file();
        let file = match config_file {
            Some(ref path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };

        Self::resolve(file, config_file, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup.
    ///
    /// Empty environment values count as unset.
    pub fn resolve<F>(file: ConfigFile, config_file: Option<PathBuf>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base_dir = config_file
            .as_deref()
            .and_then(Path::parent) // .voicetask/
            .and_then(Path::parent) // project root
            .map(Path::to_path_buf);

        let server = file.server.unwrap_or_default();
        let telegram = file.telegram.unwrap_or_default();
        let transcription = file.transcription.unwrap_or_default();
        let store = file.store.unwrap_or_default();

        let bind = if let Some(bind) = env("VOICETASK_BIND") {
            bind
        } else if let Some(port) = env("PORT") {
            let port: u16 = port
                .parse()
                .with_context(|| format!("PORT is not a valid port number: {}", port))?;
            format!("0.0.0.0:{}", port)
        } else {
            server.bind.unwrap_or_else(|| "0.0.0.0:3000".to_string())
        };

        let telegram_defaults = TelegramConfig::default();
        let telegram = TelegramConfig {
            bot_token: env("TELEGRAM_BOT_TOKEN"),
            api_base: telegram.api_base.unwrap_or(telegram_defaults.api_base),
            metadata_timeout: seconds_or(
                telegram.metadata_timeout_seconds,
                telegram_defaults.metadata_timeout,
            ),
            download_timeout: seconds_or(
                telegram.download_timeout_seconds,
                telegram_defaults.download_timeout,
            ),
            notify_timeout: seconds_or(
                telegram.notify_timeout_seconds,
                telegram_defaults.notify_timeout,
            ),
        };

        let openai_defaults = OpenAiConfig::default();
        let openai = OpenAiConfig {
            api_key: env("OPENAI_API_KEY"),
            api_base: env("OPENAI_BASE_URL")
                .or(transcription.api_base)
                .unwrap_or(openai_defaults.api_base),
            model: transcription.model.unwrap_or(openai_defaults.model),
            timeout: seconds_or(transcription.timeout_seconds, openai_defaults.timeout),
            max_request_retries: transcription
                .max_request_retries
                .unwrap_or(openai_defaults.max_request_retries),
        };

        let staging_dir = transcription
            .staging_dir
            .map(|dir| resolve_path(base_dir.as_deref(), &dir));

        let sqlite_path = match env("VOICETASK_DB") {
            Some(path) => PathBuf::from(path),
            None => match store.sqlite_path {
                Some(path) => resolve_path(base_dir.as_deref(), &path),
                None => default_sqlite_path(),
            },
        };

        Ok(Self {
            bind,
            webhook_secret: env("TELEGRAM_WEBHOOK_SECRET"),
            max_audio_bytes: server.max_audio_bytes.unwrap_or(DEFAULT_MAX_AUDIO_BYTES),
            telegram,
            transcription: TranscriptionSettings {
                openai,
                retry: transcription.retry.unwrap_or_default(),
                staging_dir,
            },
            store: StoreSettings {
                sqlite_path,
                supabase_url: env("SUPABASE_URL"),
                supabase_key: env("SUPABASE_SERVICE_ROLE_KEY"),
                timeout: seconds_or(store.timeout_seconds, Duration::from_secs(15)),
            },
            config_file,
        })
    }
}

fn seconds_or(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

/// Default database location (~/.voicetask/tasks.db)
fn default_sqlite_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".voicetask"))
        .unwrap_or_else(|| PathBuf::from(".voicetask"))
        .join("tasks.db")
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".voicetask").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse config file contents
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    // An empty file parses as YAML null.
    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: Option<&Path>, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

/// Mask a secret for display, keeping a short prefix and suffix
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 11 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
