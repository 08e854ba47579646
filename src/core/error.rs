//! HTTP-facing error type
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl is
//! the single place where failures become status codes and
//! `{"error": ...}` bodies.

use crate::audio::converter::ConversionError;
use crate::core::constants::message;
use crate::core::provider::ProviderError;
use crate::models::studio::ErrorBody;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{}", message::API_KEY_MISSING)]
    MissingCredential,

    /// Upstream failure; the message is relayed after `context`
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Logged in full, answered with the generic message
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn upstream(context: &'static str) -> impl FnOnce(ProviderError) -> ApiError {
        move |source| ApiError::Upstream { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Conversion(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            ApiError::BadRequest(msg) | ApiError::PayloadTooLarge(msg) => {
                tracing::debug!("Rejected request: {}", msg);
                msg.clone()
            }
            ApiError::MissingCredential => {
                tracing::error!("API key is not configured; refusing upstream call");
                self.to_string()
            }
            ApiError::Upstream { source, .. } => {
                tracing::error!("Upstream API error: {}", source);
                self.to_string()
            }
            ApiError::Conversion(e) => {
                if status.is_server_error() {
                    tracing::error!("Audio conversion error: {}", e);
                }
                e.to_string()
            }
            ApiError::Internal(detail) => {
                tracing::error!("Server error: {}", detail);
                message::UNEXPECTED.to_string()
            }
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(error: ApiError) -> (StatusCode, String) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body.error)
    }

    #[tokio::test]
    async fn test_missing_credential_is_500() {
        let (status, error) = body_of(ApiError::MissingCredential).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error, "API key not configured on the server.");
    }

    #[tokio::test]
    async fn test_upstream_message_relayed() {
        let err = ApiError::upstream(message::IMAGE_FAILED)(ProviderError::BadRequest(
            "API key not valid.".to_string(),
        ));
        let (status, error) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error, "AI Generation Failed: Bad request: API key not valid.");
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        let (status, error) = body_of(ApiError::Internal("db on fire".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error, message::UNEXPECTED);
    }

    #[tokio::test]
    async fn test_bad_request_is_400() {
        let (status, error) = body_of(ApiError::BadRequest(message::PROMPT_REQUIRED.into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error, "Prompt is required.");
    }
}
