//! Audio service endpoint handlers
//!
//! Uploads arrive as `multipart/form-data`, are converted by the external
//! tool inside a per-request temporary directory, and are returned as the
//! response body.

use crate::audio::converter::{AudioConverter, AudioUpload};
use crate::audio::format::ConversionOptions;
use crate::conversion::midi::parse_midi_notes;
use crate::conversion::prompts::{audio_to_midi_prompt, midi_schema};
use crate::core::config::Config;
use crate::core::constants::{health, message, midi};
use crate::core::error::ApiError;
use crate::core::provider::{GenerativeProvider, TextRequest};
use crate::core::server::with_common_layers;
use crate::models::studio::{non_blank, MidiResponse};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

/// Audio service state
#[derive(Clone)]
pub struct AudioState {
    pub config: Arc<Config>,
    pub converter: Arc<dyn AudioConverter>,
    /// Needed only by audio-to-MIDI; `None` without an API key
    pub provider: Option<Arc<dyn GenerativeProvider>>,
}

/// Create the audio service router
pub fn create_audio_router(state: AudioState) -> Router {
    let config = state.config.clone();
    let router = Router::new()
        .route("/api", get(root))
        .route("/api/audio/health", get(health_check))
        .route("/api/audio/convert", post(convert_audio))
        .route("/api/audio/to-midi", post(audio_to_midi))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    with_common_layers(router, &config)
}

/// Fields of an upload form; `file` is kept apart from the text fields
#[derive(Default)]
struct UploadForm {
    file: Option<AudioUpload>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn require_file(&mut self) -> Result<AudioUpload, ApiError> {
        self.file
            .take()
            .ok_or_else(|| ApiError::BadRequest(message::FILE_REQUIRED.to_string()))
    }
}

fn multipart_error(error: MultipartError) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(error.body_text())
    } else {
        ApiError::BadRequest(format!("Invalid multipart request: {}", error.body_text()))
    }
}

async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadForm, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        ApiError::BadRequest(format!("Invalid multipart request: {}", rejection.body_text()))
    })?;

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().map(str::to_string);
            let data = field.bytes().await.map_err(multipart_error)?;
            form.file = Some(AudioUpload::new(file_name, data.to_vec()));
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// GET /api - Health check
async fn root() -> impl IntoResponse {
    (StatusCode::OK, health::AUDIO_RUNNING)
}

/// GET /api/audio/health - Reports whether the conversion tool runs
async fn health_check(State(state): State<AudioState>) -> impl IntoResponse {
    let available = state.converter.is_available().await;
    Json(json!({
        "status": if available { "healthy" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "converter_available": available,
    }))
}

/// POST /api/audio/convert - Transcode an uploaded file
async fn convert_audio(
    State(state): State<AudioState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut form = read_form(multipart).await?;
    let upload = form.require_file()?;
    let options = ConversionOptions::from_fields(
        form.field("format"),
        form.field("sampleRate"),
        form.field("channels"),
    )?;

    let request_id = uuid::Uuid::new_v4();
    info!(%request_id, "🎧 Converting {} bytes to {}", upload.data.len(), options.format);

    let converted = state
        .converter
        .convert(&upload, &options)
        .instrument(info_span!("convert_audio", %request_id))
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, converted.format.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", converted.file_name),
            ),
        ],
        converted.data,
    )
        .into_response())
}

/// POST /api/audio/to-midi - Transcribe an instrument part to MIDI notes
async fn audio_to_midi(
    State(state): State<AudioState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MidiResponse>, ApiError> {
    let provider = state.provider.as_ref().ok_or(ApiError::MissingCredential)?;
    let mut form = read_form(multipart).await?;
    let upload = form.require_file()?;
    let instrument = non_blank(form.field("instrument"))
        .unwrap_or(midi::DEFAULT_INSTRUMENT)
        .to_string();

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("audio_to_midi", %request_id);

    let normalized = state
        .converter
        .convert(&upload, &ConversionOptions::for_transcription())
        .instrument(span.clone())
        .await?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&normalized.data);
    info!(parent: &span, "🎼 Transcribing {} part from {} bytes", instrument, normalized.data.len());

    let request = TextRequest::new(audio_to_midi_prompt(&instrument))
        .with_inline_data(normalized.format.mime_type(), encoded)
        .with_response_schema(midi_schema());
    let text = provider
        .generate_text(&request)
        .instrument(span.clone())
        .await
        .map_err(ApiError::upstream(message::AUDIO_TO_MIDI_FAILED))?;

    let notes = parse_midi_notes(&text);
    info!(parent: &span, "Transcribed {} notes", notes.len());
    Ok(Json(MidiResponse { notes }))
}
