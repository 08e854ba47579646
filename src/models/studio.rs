//! Request and response bodies exchanged with the Audiomancer frontend

use serde::{Deserialize, Serialize};

/// POST /api/generate-image body
///
/// `prompt` is optional at the wire level so a missing prompt reaches the
/// handler and gets the 400 the frontend expects instead of a rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateImageRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateImageResponse {
    #[serde(rename = "imageBytes")]
    pub image_bytes: String,
}

/// POST /api/enhance-prompt body and response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptBody {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// POST /api/generate-midi body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMidiRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub pattern_type: Option<String>,
    /// Length in bars
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub bpm: Option<u32>,
}

/// One note of a generated pattern; times are in beats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiNote {
    pub pitch: i64,
    pub start: f64,
    pub duration: f64,
    pub velocity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiResponse {
    pub notes: Vec<MidiNote>,
}

/// One earlier turn of the conversation as the frontend keeps it
#[derive(Debug, Clone, Deserialize)]
pub struct ChatHistoryEntry {
    pub role: String,
    pub text: String,
}

/// POST /api/chat body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatHistoryEntry>,
    #[serde(default)]
    pub use_search: bool,
}

/// Payload of a `message` chat event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDelta {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLink {
    pub uri: String,
    pub title: String,
}

/// Payload of the `sources` chat event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSources {
    pub sources: Vec<SourceLink>,
}

/// POST /api/generate-speech body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateSpeechRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSpeechResponse {
    pub audio_bytes: String,
    pub mime_type: String,
}

/// Base64 starting frame for a video
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    pub mime_type: String,
    pub data: String,
}

/// POST /api/generate-video body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub image: Option<ImageInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoJobResponse {
    pub operation: String,
}

/// GET /api/video-status query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoStatusQuery {
    #[serde(default)]
    pub operation: Option<String>,
}

/// `done: false` until the video is ready, then the bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatusResponse {
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bytes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// `{"error": ...}` body used by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Trimmed prompt, or `None` when missing or blank
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
