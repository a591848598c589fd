//! Tooling API handlers.

use axum::extract::{Path, State};
use axum::Json;

use preflight_core::ToolSchema;

use crate::error::ApiError;
use crate::schema::tooling::{InvokeRequest, ToolSummary};
use crate::state::AppState;
use crate::tooling::InvokeOutcome;

/// `GET /tooling/tools`
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSummary>> {
    let summaries = state
        .tools
        .schemas()
        .iter()
        .map(ToolSummary::from_schema)
        .collect();
    Json(summaries)
}

/// `GET /tooling/tools/{name}`
pub async fn get_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ToolSchema>, ApiError> {
    state
        .tools
        .schema(&name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Tool '{}' not found", name)))
}

/// `POST /tooling/tools/{name}/invoke`
///
/// Tool-level failures return 200 with `success = false`; only an unknown
/// tool is a 404.
pub async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<InvokeRequest>,
) -> Result<Json<InvokeOutcome>, ApiError> {
    state
        .tools
        .invoke(&name, request.args)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Tool '{}' not found", name)))
}
