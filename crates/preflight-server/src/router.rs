//! Router assembly for the preflight HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with CORS
//! and tracing middleware layers.

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax. CORS is permissive (the
/// dashboard may be served from another origin). TraceLayer provides
/// request-level logging via tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Testing
        .route("/testing/tests", get(handlers::testing::get_tests))
        .route(
            "/testing/runs",
            get(handlers::testing::list_runs).post(handlers::testing::create_run),
        )
        .route("/testing/runs/{id}", get(handlers::testing::get_run))
        .route(
            "/testing/runs/{id}/requeue",
            post(handlers::testing::requeue_run),
        )
        .route(
            "/testing/history",
            get(handlers::testing::get_history).delete(handlers::testing::delete_history),
        )
        .route(
            "/testing/history/{qualified_name}",
            get(handlers::testing::get_test_history)
                .delete(handlers::testing::delete_test_history),
        )
        .route(
            "/testing/history/{qualified_name}/{index}",
            delete(handlers::testing::delete_history_entry),
        )
        .route("/testing/ws/runs", get(handlers::testing::ws_runs))
        // Tooling
        .route("/tooling/tools", get(handlers::tooling::list_tools))
        .route("/tooling/tools/{name}", get(handlers::tooling::get_tool))
        .route(
            "/tooling/tools/{name}/invoke",
            post(handlers::tooling::invoke_tool),
        )
        // Chatting
        .route("/chatting/agents", get(handlers::chatting::list_agents))
        .route("/chatting/agents/{id}", get(handlers::chatting::get_agent))
        .route(
            "/chatting/conversations",
            get(handlers::chatting::list_conversations)
                .post(handlers::chatting::create_conversation),
        )
        .route(
            "/chatting/conversations/{id}",
            get(handlers::chatting::get_conversation)
                .delete(handlers::chatting::delete_conversation),
        )
        .route(
            "/chatting/conversations/{id}/clear",
            post(handlers::chatting::clear_conversation),
        )
        .route(
            "/chatting/ws/conversations/{id}",
            get(handlers::chatting::ws_conversation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `GET /health`
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
