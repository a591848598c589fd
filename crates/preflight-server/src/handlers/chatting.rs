//! Chatting API handlers: the agent catalog, conversations, and the
//! per-conversation chat stream.

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use preflight_core::{ChatAgentInfo, Conversation};

use crate::error::ApiError;
use crate::schema::chatting::CreateConversationRequest;
use crate::state::AppState;
use crate::streaming::{run_turn, ChatEvent, ClientMessage, EventSink, TurnEnd};

/// `GET /chatting/agents`
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<ChatAgentInfo>> {
    Json(state.agents.list())
}

/// `GET /chatting/agents/{id}`
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatAgentInfo>, ApiError> {
    state
        .agents
        .get(&id)
        .map(|factory| Json(factory.info()))
        .ok_or_else(|| ApiError::NotFound(format!("Agent '{}' not found", id)))
}

/// `POST /chatting/conversations`
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<Json<Conversation>, ApiError> {
    if state.agents.get(&request.agent_id).is_none() {
        return Err(ApiError::NotFound(format!(
            "Agent '{}' not found",
            request.agent_id
        )));
    }
    let conversation = state
        .conversations
        .create(request.agent_id, request.model, request.title)
        .await;
    Ok(Json(conversation))
}

/// `GET /chatting/conversations`
pub async fn list_conversations(State(state): State<AppState>) -> Json<Vec<Conversation>> {
    Json(state.conversations.list().await)
}

/// `GET /chatting/conversations/{id}`
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    let id = parse_conversation_id(&id)?;
    state
        .conversations
        .get(id)
        .await
        .map(Json)
        .ok_or_else(conversation_not_found)
}

/// `DELETE /chatting/conversations/{id}`
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_conversation_id(&id)?;
    if state.conversations.delete(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(conversation_not_found())
    }
}

/// `POST /chatting/conversations/{id}/clear`
pub async fn clear_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    let id = parse_conversation_id(&id)?;
    state
        .conversations
        .clear(id)
        .await
        .map(Json)
        .ok_or_else(conversation_not_found)
}

/// `WS /chatting/ws/conversations/{id}`
pub async fn ws_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let id = parse_conversation_id(&id)?;
    if state.conversations.get(id).await.is_none() {
        return Err(conversation_not_found());
    }
    Ok(upgrade.on_upgrade(move |socket| chat_session(socket, state, id)))
}

/// Serves one chat connection until the client leaves or a turn errors.
async fn chat_session(mut socket: WebSocket, state: AppState, conversation_id: Uuid) {
    loop {
        let message = match socket.recv().await {
            Some(Ok(message)) => message,
            _ => return,
        };
        let WsMessage::Text(text) = message else {
            continue;
        };
        // Unknown client message types are ignored.
        let Ok(ClientMessage::SendMessage { content }) = serde_json::from_str(text.as_str())
        else {
            continue;
        };

        let mut sink = WsSink { socket: &mut socket };
        match run_turn(&state, conversation_id, content, &mut sink).await {
            TurnEnd::Completed => {}
            TurnEnd::ClientGone => return,
            TurnEnd::Failed => {
                let _ = socket.send(WsMessage::Close(None)).await;
                return;
            }
        }
    }
}

struct WsSink<'a> {
    socket: &'a mut WebSocket,
}

#[async_trait]
impl EventSink for WsSink<'_> {
    async fn emit(&mut self, event: ChatEvent) -> bool {
        let Ok(text) = serde_json::to_string(&event) else {
            return true;
        };
        self.socket.send(WsMessage::Text(text.into())).await.is_ok()
    }
}

fn parse_conversation_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::BadRequest(format!("invalid conversation id '{}': expected UUID", raw))
    })
}

fn conversation_not_found() -> ApiError {
    ApiError::NotFound("Conversation not found".to_string())
}
