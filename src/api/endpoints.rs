//! Studio API endpoint handlers
//!
//! Image generation, prompt enhancement, MIDI pattern generation, the
//! streaming wizard chat, speech and video jobs, all relayed to the
//! upstream generative API with the server-side key.

use crate::conversion::chat::chat_events;
use crate::conversion::midi::parse_midi_notes;
use crate::conversion::prompts::{enhance_prompt as enhance_prompt_text, midi_pattern_prompt, midi_schema};
use crate::core::config::Config;
use crate::core::constants::{chat as chat_defaults, health, message, midi, video};
use crate::core::error::ApiError;
use crate::core::provider::{
    ChatRequest, ChatRole, ChatTurn, GenerativeProvider, ImageRequest, InlineData, TextRequest,
    VideoRequest, VideoStatus,
};
use crate::core::server::with_common_layers;
use crate::models::studio::{
    non_blank, ChatHistoryEntry, ChatRequestBody, GenerateImageRequest, GenerateImageResponse,
    GenerateMidiRequest, GenerateSpeechRequest, GenerateSpeechResponse, GenerateVideoRequest,
    MidiResponse, PromptBody, VideoJobResponse, VideoStatusQuery, VideoStatusResponse,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when no API key is configured
    pub provider: Option<Arc<dyn GenerativeProvider>>,
}

impl AppState {
    /// Provider for credential-requiring endpoints
    pub fn provider(&self) -> Result<&Arc<dyn GenerativeProvider>, ApiError> {
        self.provider.as_ref().ok_or(ApiError::MissingCredential)
    }
}

/// Create the studio API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();
    let router = Router::new()
        .route("/api", get(root))
        .route("/api/health", get(health_check))
        .route("/api/generate-image", post(generate_image))
        .route("/api/enhance-prompt", post(enhance_prompt))
        .route("/api/generate-midi", post(generate_midi))
        .route("/api/chat", post(chat))
        .route("/api/generate-speech", post(generate_speech))
        .route("/api/generate-video", post(generate_video))
        .route("/api/video-status", get(video_status))
        .with_state(state);

    with_common_layers(router, &config)
}

/// Map a JSON extractor rejection onto a 400
pub(crate) fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
}

fn required_prompt(prompt: Option<&str>) -> Result<&str, ApiError> {
    required(prompt, message::PROMPT_REQUIRED)
}

fn required<'a>(value: Option<&'a str>, error: &str) -> Result<&'a str, ApiError> {
    non_blank(value).ok_or_else(|| ApiError::BadRequest(error.to_string()))
}

/// Map the frontend's history onto chat turns, keeping the most recent ones
fn chat_history(entries: &[ChatHistoryEntry]) -> Result<Vec<ChatTurn>, ApiError> {
    let mut turns = Vec::with_capacity(entries.len());
    for entry in entries {
        let role = match entry.role.trim().to_ascii_lowercase().as_str() {
            "user" => ChatRole::User,
            "model" | "assistant" => ChatRole::Model,
            other => {
                return Err(ApiError::BadRequest(format!(
                    "Unknown chat role '{}'; expected 'user' or 'model'.",
                    other
                )));
            }
        };
        if let Some(text) = non_blank(Some(entry.text.as_str())) {
            turns.push(ChatTurn {
                role,
                text: text.to_string(),
            });
        }
    }
    let excess = turns.len().saturating_sub(chat_defaults::MAX_HISTORY_TURNS);
    turns.drain(..excess);
    Ok(turns)
}

fn one_of(value: Option<&str>, allowed: &[&str], field: &str, default: &str) -> Result<String, ApiError> {
    match non_blank(value) {
        None => Ok(default.to_string()),
        Some(v) if allowed.contains(&v) => Ok(v.to_string()),
        Some(_) => Err(ApiError::BadRequest(format!(
            "{} must be one of {}.",
            field,
            allowed.join(", ")
        ))),
    }
}

/// Operation names look like `models/<model>/operations/<id>`
fn is_operation_name(name: &str) -> bool {
    name.starts_with("models/")
        && name.contains("/operations/")
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'))
}

/// GET /api - Health check
async fn root() -> impl IntoResponse {
    (StatusCode::OK, health::STUDIO_RUNNING)
}

/// GET /api/health - Detailed health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "api_key_configured": state.config.has_api_key(),
        "provider": state.provider.as_ref().map(|p| p.provider_name().to_string()),
        "image_model": state.config.image_model,
        "text_model": state.config.text_model,
        "chat_model": state.config.chat_model,
        "speech_model": state.config.speech_model,
        "video_model": state.config.video_model,
    }))
}

/// POST /api/generate-image - Generate one image from a prompt
///
/// The credential is checked before the body so an unconfigured server
/// answers 500 whatever the client sent.
async fn generate_image(
    State(state): State<AppState>,
    body: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> Result<Json<GenerateImageResponse>, ApiError> {
    let provider = state.provider()?;
    let Json(request) = body.map_err(invalid_body)?;
    let prompt = required_prompt(request.prompt.as_deref())?;

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("generate_image", %request_id);
    info!(parent: &span, "📥 Image request: {} chars", prompt.chars().count());

    let image = provider
        .generate_image(&ImageRequest::new(prompt))
        .instrument(span.clone())
        .await
        .map_err(ApiError::upstream(message::IMAGE_FAILED))?;

    info!(parent: &span, "🖼️ Image generated ({})", image.mime_type);
    Ok(Json(GenerateImageResponse {
        image_bytes: image.image_bytes,
    }))
}

/// POST /api/enhance-prompt - Expand a short musical idea
async fn enhance_prompt(
    State(state): State<AppState>,
    body: Result<Json<PromptBody>, JsonRejection>,
) -> Result<Json<PromptBody>, ApiError> {
    let provider = state.provider()?;
    let Json(request) = body.map_err(invalid_body)?;
    let idea = required_prompt(request.prompt.as_deref())?;

    let request_id = uuid::Uuid::new_v4();
    let text = provider
        .generate_text(&TextRequest::new(enhance_prompt_text(idea)))
        .instrument(info_span!("enhance_prompt", %request_id))
        .await
        .map_err(ApiError::upstream(message::ENHANCE_FAILED))?;

    Ok(Json(PromptBody {
        prompt: Some(text.trim().to_string()),
    }))
}

/// POST /api/generate-midi - Generate a MIDI pattern from a description
async fn generate_midi(
    State(state): State<AppState>,
    body: Result<Json<GenerateMidiRequest>, JsonRejection>,
) -> Result<Json<MidiResponse>, ApiError> {
    let provider = state.provider()?;
    let Json(request) = body.map_err(invalid_body)?;
    let description = required_prompt(request.prompt.as_deref())?;

    let bars = request.duration.unwrap_or(midi::DEFAULT_BARS);
    if !(midi::MIN_BARS..=midi::MAX_BARS).contains(&bars) {
        return Err(ApiError::BadRequest(format!(
            "duration must be between {} and {} bars.",
            midi::MIN_BARS,
            midi::MAX_BARS
        )));
    }
    let bpm = request.bpm.unwrap_or(midi::DEFAULT_BPM);
    if !(midi::MIN_BPM..=midi::MAX_BPM).contains(&bpm) {
        return Err(ApiError::BadRequest(format!(
            "bpm must be between {} and {}.",
            midi::MIN_BPM,
            midi::MAX_BPM
        )));
    }
    let pattern_type = non_blank(request.pattern_type.as_deref()).unwrap_or(midi::DEFAULT_PATTERN_TYPE);

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("generate_midi", %request_id);
    info!(parent: &span, "🎹 MIDI request: {} bars of {} at {} BPM", bars, pattern_type, bpm);

    let text_request = TextRequest::new(midi_pattern_prompt(description, pattern_type, bars, bpm))
        .with_response_schema(midi_schema());
    let text = provider
        .generate_text(&text_request)
        .instrument(span.clone())
        .await
        .map_err(ApiError::upstream(message::MIDI_FAILED))?;

    let notes = parse_midi_notes(&text);
    info!(parent: &span, "Generated {} notes", notes.len());
    Ok(Json(MidiResponse { notes }))
}

/// POST /api/chat - Stream the wizard's answer as server-sent events
///
/// Failures before the first chunk are ordinary JSON errors; later ones
/// arrive as an `error` event.
async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let provider = state.provider()?;
    let Json(request) = body.map_err(invalid_body)?;
    let text = required(request.message.as_deref(), message::MESSAGE_REQUIRED)?;
    let history = chat_history(&request.history)?;

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("chat", %request_id);
    info!(
        parent: &span,
        "💬 Chat message: {} chars, {} earlier turns, search={}",
        text.chars().count(),
        history.len(),
        request.use_search
    );

    let chat_request = ChatRequest {
        system_instruction: chat_defaults::SYSTEM_INSTRUCTION.to_string(),
        history,
        message: text.to_string(),
        use_search: request.use_search,
    };
    let chunks = provider
        .chat_stream(&chat_request)
        .instrument(span)
        .await
        .map_err(ApiError::upstream(message::CHAT_FAILED))?;

    Ok(Sse::new(chat_events(chunks))
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// POST /api/generate-speech - Read text aloud
async fn generate_speech(
    State(state): State<AppState>,
    body: Result<Json<GenerateSpeechRequest>, JsonRejection>,
) -> Result<Json<GenerateSpeechResponse>, ApiError> {
    let provider = state.provider()?;
    let Json(request) = body.map_err(invalid_body)?;
    let text = required(request.text.as_deref(), message::TEXT_REQUIRED)?;

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("generate_speech", %request_id);
    info!(parent: &span, "🔊 Speech request: {} chars", text.chars().count());

    let speech = provider
        .generate_speech(text)
        .instrument(span)
        .await
        .map_err(ApiError::upstream(message::SPEECH_FAILED))?;

    Ok(Json(GenerateSpeechResponse {
        audio_bytes: speech.audio_bytes,
        mime_type: speech.mime_type,
    }))
}

/// POST /api/generate-video - Start a video job
///
/// Returns the operation name to poll with `GET /api/video-status`.
async fn generate_video(
    State(state): State<AppState>,
    body: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> Result<Json<VideoJobResponse>, ApiError> {
    let provider = state.provider()?;
    let Json(request) = body.map_err(invalid_body)?;
    let prompt = required_prompt(request.prompt.as_deref())?;

    let mut video_request = VideoRequest::new(prompt);
    video_request.aspect_ratio = one_of(
        request.aspect_ratio.as_deref(),
        video::ASPECT_RATIOS,
        "aspectRatio",
        video::DEFAULT_ASPECT_RATIO,
    )?;
    video_request.resolution = one_of(
        request.resolution.as_deref(),
        video::RESOLUTIONS,
        "resolution",
        video::DEFAULT_RESOLUTION,
    )?;
    if let Some(image) = request.image {
        if !image.mime_type.starts_with("image/") || image.data.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "image must carry base64 data and an image/* mimeType.".to_string(),
            ));
        }
        video_request.image = Some(InlineData {
            mime_type: image.mime_type,
            data: image.data,
        });
    }

    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("generate_video", %request_id);
    info!(
        parent: &span,
        "🎬 Video request: {} {} starting frame={}",
        video_request.aspect_ratio,
        video_request.resolution,
        video_request.image.is_some()
    );

    let operation = provider
        .start_video(&video_request)
        .instrument(span.clone())
        .await
        .map_err(ApiError::upstream(message::VIDEO_FAILED))?;

    info!(parent: &span, "Video job started: {}", operation);
    Ok(Json(VideoJobResponse { operation }))
}

/// GET /api/video-status?operation=... - Poll a video job
async fn video_status(
    State(state): State<AppState>,
    query: Result<Query<VideoStatusQuery>, QueryRejection>,
) -> Result<Json<VideoStatusResponse>, ApiError> {
    let provider = state.provider()?;
    let Query(query) = query.map_err(|rejection| {
        ApiError::BadRequest(format!("Invalid query: {}", rejection.body_text()))
    })?;
    let operation = non_blank(query.operation.as_deref())
        .filter(|name| is_operation_name(name))
        .ok_or_else(|| ApiError::BadRequest(message::OPERATION_REQUIRED.to_string()))?;

    let status = provider
        .poll_video(operation)
        .instrument(info_span!("video_status", operation = %operation))
        .await
        .map_err(ApiError::upstream(message::VIDEO_FAILED))?;

    Ok(Json(match status {
        VideoStatus::Pending => VideoStatusResponse {
            done: false,
            video_bytes: None,
            mime_type: None,
        },
        VideoStatus::Done(video) => {
            info!("🎞️ Video ready: {} base64 chars", video.video_bytes.len());
            VideoStatusResponse {
                done: true,
                video_bytes: Some(video.video_bytes),
                mime_type: Some(video.mime_type),
            }
        }
    }))
}
