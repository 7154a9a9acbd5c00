//! reqwest failures mapped onto `ChatError`, shared by every HTTP client.

use loco_core::llm::ChatError;
use reqwest::StatusCode;

pub fn map_reqwest_err(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Timeout(e.to_string())
    } else if e.is_request() || e.is_connect() {
        ChatError::Network(e.to_string())
    } else if e.is_decode() || e.is_body() {
        ChatError::Decode(e.to_string())
    } else {
        ChatError::Other(e.to_string())
    }
}

// Ollama and the relay both report failures as {"error": "..."}; keep just
// the message.
pub fn map_status_err(status: StatusCode, body: Option<String>) -> ChatError {
    let body = body.unwrap_or_default();
    let body = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or(body);
    ChatError::Status {
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_extracts_error_message() {
        let err = map_status_err(
            StatusCode::NOT_FOUND,
            Some(r#"{"error":"model \"x\" not found"}"#.into()),
        );
        assert!(matches!(
            err,
            ChatError::Status { status: 404, ref body } if body == "model \"x\" not found"
        ));
        let err = map_status_err(StatusCode::BAD_GATEWAY, Some("upstream down".into()));
        assert!(matches!(err, ChatError::Status { status: 502, ref body } if body == "upstream down"));
        let err = map_status_err(StatusCode::INTERNAL_SERVER_ERROR, None);
        assert!(matches!(err, ChatError::Status { status: 500, ref body } if body.is_empty()));
    }
}
