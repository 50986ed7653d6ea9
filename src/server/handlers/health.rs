use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools: Vec<&str> = state
        .controller
        .available_tools()
        .iter()
        .map(|tool| tool.as_str())
        .collect();

    Json(json!({
        "status": "ok",
        "tools": tools,
        "active_requests": state.active.len(),
    }))
}
