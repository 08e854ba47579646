//! Provider abstraction for the upstream generative API
//!
//! Handlers only see this trait, so the Gemini client can be swapped for an
//! in-process fake in tests.

use crate::core::constants::{chat, upstream, video};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Error types for provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("{0}")]
    EmptyResponse(String),

    /// A long-running job finished with an error
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ProviderError {
    /// Classify a non-success upstream status with its extracted message
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(message),
            429 => ProviderError::RateLimit(message),
            400 => ProviderError::BadRequest(message),
            _ => ProviderError::ApiError { status, message },
        }
    }
}

/// Parameters of a single image generation call
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub number_of_images: u32,
    pub output_mime_type: String,
    pub aspect_ratio: String,
}

impl ImageRequest {
    /// One square JPEG, matching what the frontend displays
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            number_of_images: upstream::IMAGE_COUNT,
            output_mime_type: upstream::IMAGE_MIME_TYPE.to_string(),
            aspect_ratio: upstream::IMAGE_ASPECT_RATIO.to_string(),
        }
    }
}

/// Image returned by the upstream, still base64 encoded
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub image_bytes: String,
    pub mime_type: String,
}

/// Base64 payload sent alongside a text prompt
#[derive(Debug, Clone, PartialEq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Parameters of a single text generation call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRequest {
    pub prompt: String,
    pub inline_data: Option<InlineData>,
    /// When set, the model is asked for `application/json` matching it
    pub response_schema: Option<serde_json::Value>,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_inline_data(mut self, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        self.inline_data = Some(InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        });
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Speaker of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => chat::ROLE_USER,
            ChatRole::Model => chat::ROLE_MODEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// One streamed chat exchange: prior turns plus the new user message
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system_instruction: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
    /// Let the model ground its answer with web search
    pub use_search: bool,
}

/// Web page the model cited
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// Incremental piece of a streamed answer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatChunk {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// Stream of chat chunks; ends after the last chunk or the first error
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, ProviderError>> + Send>>;

/// Base64 audio returned by the speech model
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSpeech {
    pub audio_bytes: String,
    pub mime_type: String,
}

/// Parameters of a video generation job
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    pub resolution: String,
    /// Optional starting frame
    pub image: Option<InlineData>,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: video::DEFAULT_ASPECT_RATIO.to_string(),
            resolution: video::DEFAULT_RESOLUTION.to_string(),
            image: None,
        }
    }
}

/// Finished video, base64 encoded
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVideo {
    pub video_bytes: String,
    pub mime_type: String,
}

/// State of a video job
#[derive(Debug, Clone, PartialEq)]
pub enum VideoStatus {
    Pending,
    Done(GeneratedVideo),
}

/// Trait for generative API providers
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Generate images from a prompt; at least one image on success
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError>;

    /// Generate text (or schema-constrained JSON text) from a prompt
    async fn generate_text(&self, request: &TextRequest) -> Result<String, ProviderError>;

    /// Start a streamed chat answer
    ///
    /// Errors returned here happen before any chunk was produced; later
    /// failures arrive as the stream's final item.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, ProviderError>;

    /// Read `text` aloud with the configured voice
    async fn generate_speech(&self, text: &str) -> Result<GeneratedSpeech, ProviderError>;

    /// Start a video job and return its operation name
    async fn start_video(&self, request: &VideoRequest) -> Result<String, ProviderError>;

    /// Check a video job; a finished job is downloaded and returned
    async fn poll_video(&self, operation: &str) -> Result<VideoStatus, ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(403, "denied".into()),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            ProviderError::from_status(429, "slow down".into()),
            ProviderError::RateLimit(_)
        ));
        assert!(matches!(
            ProviderError::from_status(503, "overloaded".into()),
            ProviderError::ApiError { status: 503, .. }
        ));
    }

    #[test]
    fn test_image_request_defaults() {
        let request = ImageRequest::new("a neon synthwave skyline");
        assert_eq!(request.number_of_images, 1);
        assert_eq!(request.output_mime_type, "image/jpeg");
        assert_eq!(request.aspect_ratio, "1:1");
    }

    #[test]
    fn test_video_request_defaults() {
        let request = VideoRequest::new("a drone flyover of a festival stage");
        assert_eq!(request.aspect_ratio, "16:9");
        assert_eq!(request.resolution, "1080p");
        assert!(request.image.is_none());
    }

    #[test]
    fn test_chat_role_names() {
        assert_eq!(ChatRole::User.as_str(), "user");
        assert_eq!(ChatRole::Model.as_str(), "model");
    }
}
