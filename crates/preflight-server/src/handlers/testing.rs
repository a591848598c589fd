//! Testing API handlers: discovery, runs, history, and the run stream.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use preflight_core::{Job, TestResult};

use crate::error::ApiError;
use crate::events::{JobEvent, Subscription};
use crate::schema::testing::{ListTestsResponse, RunRequest, RunStreamEvent, TestSummary};
use crate::state::AppState;

/// `GET /testing/tests`
pub async fn get_tests(State(state): State<AppState>) -> Json<ListTestsResponse> {
    let snapshot = state.discovery.snapshot().await;
    Json(ListTestsResponse {
        tests: snapshot.tests.iter().map(TestSummary::from_descriptor).collect(),
        error: snapshot.error,
    })
}

/// `GET /testing/runs`
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.jobs.list_jobs().await)
}

/// `GET /testing/runs/{id}`
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let id = parse_job_id(&id)?;
    state
        .jobs
        .get_job(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))
}

/// `POST /testing/runs`
pub async fn create_run(
    State(state): State<AppState>,
    payload: Option<Json<RunRequest>>,
) -> (StatusCode, Json<Job>) {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let job = state.jobs.create_job(request.tests).await;
    (StatusCode::ACCEPTED, Json(job))
}

/// `POST /testing/runs/{id}/requeue`
pub async fn requeue_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let id = parse_job_id(&id)?;
    let job = state
        .jobs
        .requeue(id)
        .await
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// `GET /testing/history`
pub async fn get_history(
    State(state): State<AppState>,
) -> Json<std::collections::BTreeMap<String, TestResult>> {
    Json(state.history.latest())
}

/// `GET /testing/history/{qualified_name}`
pub async fn get_test_history(
    State(state): State<AppState>,
    Path(qualified_name): Path<String>,
) -> Json<Vec<TestResult>> {
    Json(state.history.list(&qualified_name))
}

/// `DELETE /testing/history`
pub async fn delete_history(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.history.truncate_all()?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /testing/history/{qualified_name}`
pub async fn delete_test_history(
    State(state): State<AppState>,
    Path(qualified_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.history.truncate(&qualified_name)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /testing/history/{qualified_name}/{index}`
pub async fn delete_history_entry(
    State(state): State<AppState>,
    Path((qualified_name, index)): Path<(String, usize)>,
) -> Result<StatusCode, ApiError> {
    state.history.delete_at(&qualified_name, index)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `WS /testing/ws/runs`
pub async fn ws_runs(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    let subscription = state.jobs.subscribe().await;
    upgrade.on_upgrade(move |socket| run_stream(socket, subscription))
}

/// Forwards job events to one WebSocket client until it disconnects.
///
/// Client-to-server frames are drained and ignored.
async fn run_stream(mut socket: WebSocket, mut subscription: Subscription) {
    loop {
        tokio::select! {
            event = subscription.next() => {
                let frame = match event {
                    JobEvent::Snapshot(jobs) => RunStreamEvent::Snapshot { jobs },
                    JobEvent::Delta(job) => RunStreamEvent::Job { job },
                };
                let Ok(text) = serde_json::to_string(&frame) else {
                    continue;
                };
                if socket.send(WsMessage::Text(text.into())).await.is_err() {
                    return;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(_)) => {}
                    _ => return,
                }
            }
        }
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::BadRequest(format!("invalid job id '{}': expected UUID", raw)))
}
