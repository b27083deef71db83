//! Best-effort replies to the originating chat.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapters::Notifier;

/// Reply sent after a task was saved
pub fn saved_reply(text: &str) -> String {
    format!("✅ Saved: {}", text)
}

/// Reply sent when a voice note could not be transcribed
pub const FAILURE_REPLY: &str = "⚠️ Could not transcribe your voice note. Please try again.";

/// Outbound acknowledgment sink.
///
/// Failures are logged and swallowed; nothing is retried.
#[derive(Clone, Default)]
pub struct NotificationSink {
    notifier: Option<Arc<dyn Notifier>>,
}

impl NotificationSink {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier: Some(notifier),
        }
    }

    /// A sink that drops every message
    pub fn disabled() -> Self {
        Self { notifier: None }
    }

    /// Send a reply; returns whether the transport accepted it
    pub async fn notify(&self, origin_id: &str, text: &str) -> bool {
        let Some(notifier) = &self.notifier else {
            debug!(chat_id = %origin_id, "No notifier configured, skipping reply");
            return false;
        };

        match notifier.send_message(origin_id, text).await {
            Ok(()) => {
                debug!(chat_id = %origin_id, "Reply sent");
                true
            }
            Err(e) => {
                warn!(chat_id = %origin_id, error = %e, "Failed to send reply");
                false
            }
        }
    }
}
