use axum::{extract::State, Json};
use loco_core::llm::ModelClient as _;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::state::AppState;

// GET /models
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let models = state.client.list_models().await.map_err(ApiError::Models)?;
    Ok(Json(json!({ "models": models })))
}
