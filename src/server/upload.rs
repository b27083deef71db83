//! Direct upload from the mobile app.
//!
//! Multipart form with an `audio` file field and an optional `saveTask`
//! flag. Transcription runs inside the request.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::core::DirectUploadError;
use crate::domain::{content_type_for, AudioPayload, ValidationError};

use super::AppState;

const AUDIO_FIELD: &str = "audio";
const SAVE_FIELD: &str = "saveTask";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub transcription: String,
    pub saved: bool,
}

/// Form contents after reading every field
#[derive(Debug, Default)]
struct UploadForm {
    audio: Option<AudioPayload>,
    save: bool,
}

/// Interpret the `saveTask` form value
fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

async fn read_form(mut multipart: Multipart, max_bytes: u64) -> Result<UploadForm, Response> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_rejection)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(AUDIO_FIELD) => {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| content_type_for(field.file_name().unwrap_or("")).to_string());
                let bytes = field.bytes().await.map_err(multipart_rejection)?;

                if bytes.len() as u64 > max_bytes {
                    return Err(validation_rejection(&ValidationError::AudioTooLarge {
                        limit: max_bytes,
                    }));
                }
                info!(bytes = bytes.len(), content_type = %content_type, "Received audio upload");
                form.audio = Some(AudioPayload::new(bytes.to_vec(), content_type));
            }
            Some(SAVE_FIELD) => {
                let value = field.text().await.map_err(multipart_rejection)?;
                form.save = parse_flag(&value);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Handler for `POST /app/transcribe`
pub async fn transcribe_upload(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart, state.max_audio_bytes).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let Some(audio) = form.audio else {
        return validation_rejection(&ValidationError::MissingAudio);
    };

    match state.orchestrator.ingest_direct(audio, form.save).await {
        Ok(result) => Json(UploadResponse {
            success: true,
            transcription: result.transcription,
            saved: result.saved.is_some(),
        })
        .into_response(),
        Err(DirectUploadError::Validation(e)) => validation_rejection(&e),
        Err(e) => {
            error!(error = %e, "Error transcribing uploaded audio");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Transcription failed",
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Handler for `GET /app/health`
pub async fn app_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "App API is healthy" }))
}

fn validation_rejection(err: &ValidationError) -> Response {
    let status = match err {
        ValidationError::AudioTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    warn!(error = %err, "Rejected upload");
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

fn multipart_rejection(err: MultipartError) -> Response {
    warn!(error = %err, "Malformed multipart upload");
    (err.status(), Json(json!({ "error": err.body_text() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
