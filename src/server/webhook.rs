//! Telegram webhook receiver.
//!
//! Telegram expects an answer within a few seconds, so the update is parsed,
//! acknowledged, and handed to a background task. Errors after the
//! acknowledgment are only logged.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::IngestionOrchestrator;
use crate::domain::InboundEvent;

use super::AppState;

/// Header carrying the shared webhook secret
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Outcome of receiving one callback
#[derive(Debug)]
pub struct WebhookAck {
    pub status: StatusCode,
    /// Background ingestion, if an event was dispatched
    pub task: Option<JoinHandle<()>>,
}

/// Check the secret header. With no configured secret every request passes.
pub fn verify_secret(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|provided| secrets_match(expected, provided))
        .unwrap_or(false)
}

/// Compare digests so the comparison does not depend on where the inputs differ
fn secrets_match(expected: &str, provided: &str) -> bool {
    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(provided.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Validate, parse and dispatch one callback body
pub fn receive(state: &AppState, headers: &HeaderMap, body: &[u8]) -> WebhookAck {
    if !verify_secret(state.webhook_secret.as_deref(), headers) {
        warn!("Webhook secret mismatch");
        return WebhookAck {
            status: StatusCode::FORBIDDEN,
            task: None,
        };
    }

    let task = match InboundEvent::from_update_json(body) {
        Ok(Some(event)) => {
            info!(kind = event.kind(), chat_id = %event.origin_id(), "Received Telegram update");
            Some(dispatch(state.orchestrator.clone(), event))
        }
        Ok(None) => {
            debug!("Update carries no text or voice message");
            None
        }
        Err(e) => {
            warn!(error = %e, "Dropping invalid Telegram update");
            None
        }
    };

    WebhookAck {
        status: StatusCode::OK,
        task,
    }
}

/// Run ingestion in the background; failures stop at this boundary
pub fn dispatch(orchestrator: Arc<IngestionOrchestrator>, event: InboundEvent) -> JoinHandle<()> {
    tokio::spawn(async move {
        let kind = event.kind();
        let chat_id = event.origin_id().to_string();
        if let Err(e) = orchestrator.ingest(event).await {
            error!(kind, chat_id = %chat_id, error = %e, "Error processing Telegram update");
        }
    })
}

/// Handler for `POST /telegram/webhook`
pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ack = receive(&state, &headers, &body);

    match ack.status {
        StatusCode::OK => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        status => (status, Json(json!({ "error": "Forbidden" }))).into_response(),
    }
}

/// Handler for `GET /telegram/test`
pub async fn webhook_test() -> Json<serde_json::Value> {
    Json(json!({ "message": "Telegram webhook is active!" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, HeaderValue::from_str(secret).unwrap());
        headers
    }

    #[test]
    fn test_no_secret_configured_allows_all() {
        assert!(verify_secret(None, &HeaderMap::new()));
        assert!(verify_secret(None, &headers("anything")));
    }

    #[test]
    fn test_secret_must_match() {
        assert!(verify_secret(Some("s3cret"), &headers("s3cret")));
        assert!(!verify_secret(Some("s3cret"), &headers("s3cre")));
        assert!(!verify_secret(Some("s3cret"), &HeaderMap::new()));
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("abc", "abc"));
        assert!(!secrets_match("abc", "abd"));
        assert!(!secrets_match("abc", ""));
    }
}
