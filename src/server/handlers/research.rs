use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::research::{ResearchContext, TerminationReason, ToolId};
use crate::state::AppState;

const MAX_REQUEST_ITERATIONS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub first_tool: Option<String>,
}

pub async fn run_research(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Response, ApiError> {
    let mut ctx = ResearchContext::new();

    if let Some(request_id) = payload
        .request_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        ctx = ctx.with_request_id(request_id);
    }

    if let Some(max_iterations) = payload.max_iterations {
        if max_iterations == 0 || max_iterations > MAX_REQUEST_ITERATIONS {
            return Err(ApiError::BadRequest(format!(
                "max_iterations must be between 1 and {}",
                MAX_REQUEST_ITERATIONS
            )));
        }
        ctx = ctx.with_max_iterations(max_iterations);
    }

    if let Some(raw) = payload.first_tool.as_deref() {
        let tool = ToolId::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown tool: {}", raw)))?;
        ctx = ctx.with_first_tool(tool);
    }

    let active = state.active.register(&ctx.request_id).ok_or_else(|| {
        ApiError::BadRequest(format!("Research {} is already running", ctx.request_id))
    })?;
    let ctx = ctx.with_cancellation(active.token());

    let result = state.controller.research(&payload.query, ctx).await;
    drop(active);

    let status = if result.terminated_by == TerminationReason::InvalidQuery {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)).into_response())
}

pub async fn cancel_research(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.active.cancel(&request_id) {
        return Err(ApiError::NotFound(format!(
            "No running research with id {}",
            request_id
        )));
    }
    tracing::info!("Cancellation requested for {}", request_id);
    Ok(Json(json!({"status": "cancelling", "request_id": request_id})))
}
