use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde_json::json;
use thiserror::Error;

/// Failures that reach the HTTP caller. Upstream and parsing problems never
/// end up here; the pipeline absorbs them into fallback content.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid JSON in request body")]
    InvalidBody,
    #[error("Unsupported language. Use english, hindi or tamil.")]
    UnsupportedLanguage,
    #[error("Topic cannot be empty")]
    EmptyTopic,
    #[error("Prompt too long. Please use a shorter topic.")]
    PromptTooLong { estimated_tokens: usize, limit: usize },
    #[error("{0}")]
    InvalidField(String),
    #[error("Only POST allowed")]
    MethodNotAllowed,
    #[error("Server error")]
    Internal { detail: String, development: bool },
}

impl ApiError {
    pub fn internal(err: impl std::fmt::Display, development: bool) -> Self {
        Self::Internal { detail: err.to_string(), development }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody
            | Self::UnsupportedLanguage
            | Self::EmptyTopic
            | Self::PromptTooLong { .. }
            | Self::InvalidField(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Internal { detail, development } => {
                tracing::error!("❌ Internal error: {}", detail);
                let message = if *development { detail.as_str() } else { "An internal error occurred" };
                json!({ "error": self.to_string(), "message": message })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
