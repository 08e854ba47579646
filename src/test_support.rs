//! In-process fakes and request helpers shared by router tests

use crate::audio::converter::{AudioConverter, AudioUpload, ConversionError, ConvertedAudio};
use crate::audio::format::ConversionOptions;
use crate::core::provider::{
    ChatChunk, ChatRequest, ChatStream, GeneratedImage, GeneratedSpeech, GeneratedVideo,
    GenerativeProvider, GroundingSource, ImageRequest, ProviderError, TextRequest, VideoRequest,
    VideoStatus,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use std::sync::Mutex;
use tower::ServiceExt;

pub const MULTIPART_BOUNDARY: &str = "audiomancer-test-boundary";

/// Provider returning canned results and recording what it was asked
#[derive(Default)]
pub struct MockProvider {
    pub fail_with: Option<String>,
    pub text: String,
    /// Items of the chat stream; `Err` ends it with that message
    pub chat_items: Vec<Result<ChatChunk, String>>,
    pub video_ready: bool,
    pub image_requests: Mutex<Vec<ImageRequest>>,
    pub text_requests: Mutex<Vec<TextRequest>>,
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    pub speech_requests: Mutex<Vec<String>>,
    pub video_requests: Mutex<Vec<VideoRequest>>,
    pub polled_operations: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn with_chunks(chunks: &[&str]) -> Self {
        Self {
            chat_items: chunks
                .iter()
                .map(|text| {
                    Ok(ChatChunk {
                        text: text.to_string(),
                        sources: Vec::new(),
                    })
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Appends a chunk citing `uri`
    pub fn with_source(mut self, uri: &str, title: &str) -> Self {
        self.chat_items.push(Ok(ChatChunk {
            text: String::new(),
            sources: vec![GroundingSource {
                uri: uri.to_string(),
                title: title.to_string(),
            }],
        }));
        self
    }

    /// Appends a mid-stream failure
    pub fn then_error(mut self, message: &str) -> Self {
        self.chat_items.push(Err(message.to_string()));
        self
    }

    pub fn with_ready_video() -> Self {
        Self {
            video_ready: true,
            ..Default::default()
        }
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    fn failure(&self) -> Option<ProviderError> {
        self.fail_with.as_ref().map(|m| ProviderError::ApiError {
            status: 503,
            message: m.clone(),
        })
    }

    pub fn call_count(&self) -> usize {
        self.image_requests.lock().unwrap().len()
            + self.text_requests.lock().unwrap().len()
            + self.chat_requests.lock().unwrap().len()
            + self.speech_requests.lock().unwrap().len()
            + self.video_requests.lock().unwrap().len()
            + self.polled_operations.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeProvider for MockProvider {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        self.image_requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(GeneratedImage {
            image_bytes: "/9j/4AAQSkZJRgABAQ==".to_string(),
            mime_type: request.output_mime_type.clone(),
        })
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<String, ProviderError> {
        self.text_requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(self.text.clone())
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, ProviderError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.failure() {
            return Err(err);
        }
        let items: Vec<Result<ChatChunk, ProviderError>> = self
            .chat_items
            .iter()
            .cloned()
            .map(|item| item.map_err(ProviderError::Unexpected))
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn generate_speech(&self, text: &str) -> Result<GeneratedSpeech, ProviderError> {
        self.speech_requests.lock().unwrap().push(text.to_string());
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok(GeneratedSpeech {
            audio_bytes: "UklGRg==".to_string(),
            mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
        })
    }

    async fn start_video(&self, request: &VideoRequest) -> Result<String, ProviderError> {
        self.video_requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.failure() {
            return Err(err);
        }
        Ok("models/veo-test/operations/op-1".to_string())
    }

    async fn poll_video(&self, operation: &str) -> Result<VideoStatus, ProviderError> {
        self.polled_operations
            .lock()
            .unwrap()
            .push(operation.to_string());
        if let Some(err) = self.failure() {
            return Err(err);
        }
        if !self.video_ready {
            return Ok(VideoStatus::Pending);
        }
        Ok(VideoStatus::Done(GeneratedVideo {
            video_bytes: "AAAAIGZ0eXA=".to_string(),
            mime_type: "video/mp4".to_string(),
        }))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// Converter that never spawns a process
#[derive(Default)]
pub struct StubConverter {
    pub unavailable: bool,
    pub calls: Mutex<Vec<(Option<String>, ConversionOptions)>>,
}

impl StubConverter {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl AudioConverter for StubConverter {
    async fn convert(
        &self,
        upload: &AudioUpload,
        options: &ConversionOptions,
    ) -> Result<ConvertedAudio, ConversionError> {
        self.calls
            .lock()
            .unwrap()
            .push((upload.file_name.clone(), *options));
        if self.unavailable {
            return Err(ConversionError::ToolUnavailable);
        }
        Ok(ConvertedAudio {
            data: b"converted".to_vec(),
            format: options.format,
            file_name: format!("{}.{}", upload.safe_stem(), options.format.extension()),
        })
    }

    async fn is_available(&self) -> bool {
        !self.unavailable
    }
}

pub fn json_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Text field: `(name, None, value)`; file field: `(name, Some(filename), bytes)`
pub fn multipart_post(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file_name, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn with_origin(mut request: Request<Body>, origin: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(header::ORIGIN, origin.parse().unwrap());
    request
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = send(app, request).await;
    let status = response.status();
    let bytes = body_bytes(response).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}
