use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use loco_core::llm::{ChatError, ValidationError};
use serde_json::json;
use tracing::{error, warn};

pub const UPSTREAM_CHAT_ERROR: &str = "Failed to generate response from Ollama";
pub const UPSTREAM_MODELS_ERROR: &str = "Failed to fetch models from Ollama";

/// Every failure leaves the relay as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Upstream(ChatError),
    Models(ChatError),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError::Upstream(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(e) => {
                warn!(target:"server::api","rejected request: {}", e);
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Upstream(e) => {
                error!(target:"server::api","ollama chat failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, UPSTREAM_CHAT_ERROR.to_string())
            }
            ApiError::Models(e) => {
                error!(target:"server::api","ollama model listing failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, UPSTREAM_MODELS_ERROR.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
