//! Schema types for the chatting API.

use serde::Deserialize;

/// Request payload for `POST /chatting/conversations`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationRequest {
    pub agent_id: String,
    pub model: String,
    #[serde(default)]
    pub title: Option<String>,
}
