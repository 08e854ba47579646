//! Gemini provider implementation
//!
//! Talks to the Generative Language REST API: Imagen `:predict` for images,
//! `:generateContent` for text and speech, `:streamGenerateContent` for chat
//! and Veo `:predictLongRunning` plus operation polling for video. The API
//! key travels in the `x-goog-api-key` header so it never shows up in logged
//! URLs.

use crate::core::config::Config;
use crate::core::constants::{chat, message, upstream};
use crate::core::provider::{
    ChatChunk, ChatRequest, ChatStream, GeneratedImage, GeneratedSpeech, GeneratedVideo,
    GenerativeProvider, GroundingSource, ImageRequest, ProviderError, TextRequest, VideoRequest,
    VideoStatus,
};
use crate::models::gemini::{
    Blob, Content, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, GoogleSearch, ImagenInstance, ImagenOutputOptions, ImagenParameters,
    ImagenPredictRequest, ImagenPredictResponse, Operation, Part, SpeechConfig, Tool, VeoImage,
    VeoInstance, VeoParameters, VeoPredictRequest,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_util::io::StreamReader;
use tracing::{debug, error, warn};

/// Model names used per capability
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiModels {
    pub image: String,
    pub text: String,
    pub chat: String,
    pub speech: String,
    pub voice: String,
    pub video: String,
}

impl Default for GeminiModels {
    fn default() -> Self {
        Self {
            image: upstream::IMAGE_MODEL.to_string(),
            text: upstream::TEXT_MODEL.to_string(),
            chat: upstream::CHAT_MODEL.to_string(),
            speech: upstream::SPEECH_MODEL.to_string(),
            voice: upstream::SPEECH_VOICE.to_string(),
            video: upstream::VIDEO_MODEL.to_string(),
        }
    }
}

impl GeminiModels {
    pub fn from_config(config: &Config) -> Self {
        Self {
            image: config.image_model.clone(),
            text: config.text_model.clone(),
            chat: config.chat_model.clone(),
            speech: config.speech_model.clone(),
            voice: config.speech_voice.clone(),
            video: config.video_model.clone(),
        }
    }
}

/// Gemini / Imagen / Veo provider
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    models: GeminiModels,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    ///
    /// # Arguments
    ///
    /// * `api_key` - Generative Language API key
    /// * `base_url` - API base URL, e.g. `https://generativelanguage.googleapis.com/v1beta`
    /// * `models` - Model used for each capability
    /// * `timeout` - Request timeout in seconds
    pub fn new(
        api_key: String,
        base_url: String,
        models: GeminiModels,
        timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            models,
        })
    }

    /// Build a provider from configuration; `None` when no API key is set
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        Self::new(
            api_key,
            config.gemini_base_url.clone(),
            GeminiModels::from_config(config),
            config.request_timeout,
        )
        .map(Some)
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    /// Extract the human-readable message from an upstream error body
    fn extract_error_message(body: &str) -> String {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) if !envelope.error.message.is_empty() => {
                debug!("Upstream error envelope: {}", envelope.error.summary());
                envelope.error.message
            }
            _ if body.trim().is_empty() => "Unknown error".to_string(),
            _ => body.trim().to_string(),
        }
    }

    /// Attach the key, send, and turn non-success statuses into errors
    async fn send_checked(&self, builder: RequestBuilder) -> Result<reqwest::Response, ProviderError> {
        let response = builder
            .header(upstream::API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| {
                error!("Upstream request failed: {}", e);
                ProviderError::Unexpected(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = Self::extract_error_message(&error_text);
            warn!("Upstream returned {}: {}", status, message);
            return Err(ProviderError::from_status(status.as_u16(), message));
        }

        Ok(response)
    }

    async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, ProviderError> {
        response
            .json()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to parse response: {}", e)))
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("POST {}", url);
        let response = self.send_checked(self.client.post(url).json(body)).await?;
        Self::read_json(response).await
    }

    async fn get_json<R: DeserializeOwned>(&self, url: &str) -> Result<R, ProviderError> {
        debug!("GET {}", url);
        let response = self.send_checked(self.client.get(url)).await?;
        Self::read_json(response).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        debug!("Downloading generated media");
        let response = self.send_checked(self.client.get(url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("Failed to download media: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Decode one line of a `?alt=sse` chat stream
///
/// Returns `None` for blank lines, comments and chunks without content.
fn parse_stream_line(line: &str) -> Option<Result<ChatChunk, ProviderError>> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(data) {
        warn!("Chat stream error: {}", envelope.error.summary());
        return Some(Err(ProviderError::Unexpected(envelope.error.message)));
    }

    let response: GenerateContentResponse = match serde_json::from_str(data) {
        Ok(response) => response,
        Err(e) => {
            return Some(Err(ProviderError::Unexpected(format!(
                "Malformed stream chunk: {}",
                e
            ))));
        }
    };

    if let Some(reason) = response.block_reason() {
        return Some(Err(ProviderError::EmptyResponse(format!(
            "The model returned no text (blocked: {}).",
            reason
        ))));
    }

    let text = response.text().unwrap_or_default();
    let sources: Vec<GroundingSource> = response
        .web_sources()
        .into_iter()
        .filter_map(|web| {
            let uri = web.uri.clone()?;
            Some(GroundingSource {
                title: web.title.clone().unwrap_or_else(|| uri.clone()),
                uri,
            })
        })
        .collect();

    if let Some(reason) = response.finish_reason() {
        debug!("Chat stream finished: {}", reason);
    }
    if text.is_empty() && sources.is_empty() {
        return None;
    }
    Some(Ok(ChatChunk { text, sources }))
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        let body = ImagenPredictRequest {
            instances: vec![ImagenInstance {
                prompt: request.prompt.clone(),
            }],
            parameters: ImagenParameters {
                sample_count: request.number_of_images,
                aspect_ratio: request.aspect_ratio.clone(),
                output_options: ImagenOutputOptions {
                    mime_type: request.output_mime_type.clone(),
                },
            },
        };

        let url = self.model_url(&self.models.image, "predict");
        let response: ImagenPredictResponse = self.post_json(&url, &body).await?;

        let mut filtered_reason = None;
        for prediction in response.predictions {
            match prediction.bytes_base64_encoded {
                Some(bytes) if !bytes.is_empty() => {
                    return Ok(GeneratedImage {
                        image_bytes: bytes,
                        mime_type: prediction
                            .mime_type
                            .unwrap_or_else(|| request.output_mime_type.clone()),
                    });
                }
                _ => {
                    if prediction.rai_filtered_reason.is_some() {
                        filtered_reason = prediction.rai_filtered_reason;
                    }
                }
            }
        }

        if let Some(reason) = filtered_reason {
            warn!("Image generation filtered: {}", reason);
        }
        Err(ProviderError::EmptyResponse(message::NO_IMAGE.to_string()))
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<String, ProviderError> {
        let mut parts = Vec::new();
        if let Some(inline) = &request.inline_data {
            parts.push(Part {
                inline_data: Some(Blob {
                    mime_type: inline.mime_type.clone(),
                    data: inline.data.clone(),
                }),
                ..Default::default()
            });
        }
        parts.push(Part {
            text: Some(request.prompt.clone()),
            ..Default::default()
        });

        let generation_config = request.response_schema.as_ref().map(|schema| GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema.clone()),
            ..Default::default()
        });

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some(chat::ROLE_USER.to_string()),
                parts,
            }],
            generation_config,
            ..Default::default()
        };

        let url = self.model_url(&self.models.text, "generateContent");
        let response: GenerateContentResponse = self.post_json(&url, &body).await?;

        if let Some(text) = response.text() {
            return Ok(text);
        }

        if let Some(reason) = response.finish_reason() {
            warn!("Text generation finished without text: {}", reason);
        }
        let reason = response
            .block_reason()
            .map(|r| format!("The model returned no text (blocked: {}).", r))
            .unwrap_or_else(|| "The model returned no text.".to_string());
        Err(ProviderError::EmptyResponse(reason))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, ProviderError> {
        let mut contents: Vec<Content> = request
            .history
            .iter()
            .map(|turn| Content::text(Some(turn.role.as_str()), turn.text.clone()))
            .collect();
        contents.push(Content::text(Some(chat::ROLE_USER), request.message.clone()));

        let tools = if request.use_search {
            vec![Tool {
                google_search: Some(GoogleSearch {}),
            }]
        } else {
            Vec::new()
        };

        let body = GenerateContentRequest {
            contents,
            system_instruction: Some(Content::text(None, request.system_instruction.clone())),
            tools,
            generation_config: None,
        };

        let url = format!(
            "{}?alt=sse",
            self.model_url(&self.models.chat, "streamGenerateContent")
        );
        debug!("POST {} (stream)", url);
        let response = self.send_checked(self.client.post(&url).json(&body)).await?;

        let byte_stream = response.bytes_stream().map_err(std::io::Error::other);
        let lines = LinesStream::new(BufReader::new(StreamReader::new(byte_stream)).lines());

        let stream = async_stream::stream! {
            tokio::pin!(lines);

            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => match parse_stream_line(&line) {
                        Some(Ok(chunk)) => yield Ok(chunk),
                        Some(Err(e)) => {
                            yield Err(e);
                            break;
                        }
                        None => {}
                    },
                    Err(e) => {
                        error!("Chat stream interrupted: {}", e);
                        yield Err(ProviderError::Unexpected(format!("Stream interrupted: {}", e)));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn generate_speech(&self, text: &str) -> Result<GeneratedSpeech, ProviderError> {
        let body = GenerateContentRequest {
            contents: vec![Content::text(None, text)],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig::prebuilt(self.models.voice.clone())),
                ..Default::default()
            }),
            ..Default::default()
        };

        let url = self.model_url(&self.models.speech, "generateContent");
        let response: GenerateContentResponse = self.post_json(&url, &body).await?;

        match response.inline_data() {
            Some(blob) if !blob.data.is_empty() => Ok(GeneratedSpeech {
                audio_bytes: blob.data.clone(),
                mime_type: if blob.mime_type.is_empty() {
                    upstream::SPEECH_MIME_TYPE.to_string()
                } else {
                    blob.mime_type.clone()
                },
            }),
            _ => {
                warn!(
                    "Speech response carried no audio (finish reason: {})",
                    response.finish_reason().unwrap_or("none")
                );
                Err(ProviderError::EmptyResponse(message::NO_AUDIO.to_string()))
            }
        }
    }

    async fn start_video(&self, request: &VideoRequest) -> Result<String, ProviderError> {
        let body = VeoPredictRequest {
            instances: vec![VeoInstance {
                prompt: request.prompt.clone(),
                image: request.image.as_ref().map(|image| VeoImage {
                    bytes_base64_encoded: image.data.clone(),
                    mime_type: image.mime_type.clone(),
                }),
            }],
            parameters: VeoParameters {
                aspect_ratio: request.aspect_ratio.clone(),
                resolution: request.resolution.clone(),
                sample_count: upstream::VIDEO_COUNT,
            },
        };

        let url = self.model_url(&self.models.video, "predictLongRunning");
        let operation: Operation = self.post_json(&url, &body).await?;
        if operation.name.is_empty() {
            return Err(ProviderError::Unexpected(
                "Video job was accepted without an operation name".to_string(),
            ));
        }
        Ok(operation.name)
    }

    async fn poll_video(&self, operation: &str) -> Result<VideoStatus, ProviderError> {
        let url = format!("{}/{}", self.base_url, operation);
        let operation: Operation = self.get_json(&url).await?;

        if let Some(err) = &operation.error {
            warn!("Video operation failed: {}", err.summary());
            return Err(ProviderError::OperationFailed(err.message.clone()));
        }
        if !operation.done {
            return Ok(VideoStatus::Pending);
        }

        let Some((uri, mime_type)) = operation
            .video()
            .and_then(|v| Some((v.uri.clone()?, v.mime_type.clone())))
        else {
            let reasons = operation.filtered_reasons();
            if !reasons.is_empty() {
                warn!("Video generation filtered: {}", reasons.join("; "));
            }
            return Err(ProviderError::EmptyResponse(message::NO_VIDEO.to_string()));
        };

        let data = self.download(&uri).await?;
        Ok(VideoStatus::Done(GeneratedVideo {
            video_bytes: base64::engine::general_purpose::STANDARD.encode(&data),
            mime_type: mime_type.unwrap_or_else(|| upstream::VIDEO_MIME_TYPE.to_string()),
        }))
    }

    fn provider_name(&self) -> &str {
        upstream::PROVIDER_NAME
    }
}
