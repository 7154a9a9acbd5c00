use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{sse::Event, IntoResponse, Response, Sse},
    Json,
};
use futures::{stream, StreamExt};
use loco_core::llm::{CompletionRequest, ModelClient as _, ValidationError};
use loco_core::sse::StreamFrame;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::api::error::ApiError;
use crate::relay::{relay_frames, STREAM_ERROR};
use crate::state::AppState;

// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ValidationError::Body(e.body_text()))?;
    let req = CompletionRequest::from_json(&body)?;
    info!(target:"server::api","chat model={} messages={} stream={}", req.model, req.messages.len(), req.stream);

    if !req.stream {
        let result = state.client.send_chat(&req).await?;
        return Ok(Json(json!({ "response": result.text })).into_response());
    }

    // A backend that cannot be opened still gets an event stream, ending in
    // the single error frame.
    let frames = match state.client.stream_chat(&req).await {
        Ok(deltas) => relay_frames(deltas).boxed(),
        Err(e) => {
            error!(target:"server::api","ollama stream open failed: {}", e);
            stream::iter([StreamFrame::Error(STREAM_ERROR.to_string())]).boxed()
        }
    };
    let events = frames
        .map(|frame| Ok::<_, Infallible>(Event::default().data(frame.to_json().to_string())));
    Ok(([(header::CONNECTION, "keep-alive")], Sse::new(events)).into_response())
}
