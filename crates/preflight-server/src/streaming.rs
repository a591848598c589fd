//! Chat relay: bridges one client connection to a streaming agent turn.
//!
//! Events flow to the client in exactly the order the agent produced them.
//! A turn always terminates the event stream with `message_end` or `error`;
//! the WebSocket handler closes the connection after an `error`.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use preflight_core::{AgentStreamEvent, Message, MessageRole, ToolCallRecord};

use crate::state::AppState;

/// One event on the chat WebSocket, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Echo of a stored message (the client's own, on send).
    Message(Message),
    Token {
        content: String,
    },
    ToolCall(ToolCallRecord),
    ToolOutput {
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        content: String,
    },
    MessageEnd,
    Error {
        message: String,
    },
}

/// Messages a chat client may send. Anything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SendMessage { content: String },
}

/// How one turn ended, from the connection handler's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEnd {
    /// `message_end` was delivered; keep the connection open.
    Completed,
    /// The client stopped accepting events mid-stream.
    ClientGone,
    /// An `error` event was emitted; the relay closes the connection.
    Failed,
}

/// Where turn events go; the WebSocket in production, a buffer in tests.
#[async_trait]
pub trait EventSink: Send {
    /// Delivers one event. Returns `false` when the client is gone.
    async fn emit(&mut self, event: ChatEvent) -> bool;
}

/// Runs one `send_message` turn for a conversation.
pub async fn run_turn(
    state: &AppState,
    conversation_id: Uuid,
    content: String,
    sink: &mut dyn EventSink,
) -> TurnEnd {
    let Some(_guard) = state.conversations.begin_stream(conversation_id) else {
        sink.emit(ChatEvent::Error {
            message: "a response stream is already active for this conversation".to_string(),
        })
        .await;
        return TurnEnd::Failed;
    };

    let Some(conversation) = state.conversations.get(conversation_id).await else {
        sink.emit(ChatEvent::Error {
            message: format!("conversation not found: {}", conversation_id),
        })
        .await;
        return TurnEnd::Failed;
    };

    // Store the user message, then echo it back.
    let human = Message::new(MessageRole::Human, content);
    let _ = state
        .conversations
        .push_message(conversation_id, human.clone())
        .await;
    if !sink.emit(ChatEvent::Message(human)).await {
        return TurnEnd::ClientGone;
    }

    // Hot-reload user source so the next agent build sees fresh code.
    if let Err(err) = state.discovery.reload().await {
        tracing::warn!(%err, "hot reload before chat turn failed");
    }

    let Some(factory) = state.agents.get(&conversation.agent_id) else {
        sink.emit(ChatEvent::Error {
            message: format!("agent not found: {}", conversation.agent_id),
        })
        .await;
        return TurnEnd::Failed;
    };
    let agent = match factory.build(&conversation.model).await {
        Ok(agent) => agent,
        Err(err) => {
            sink.emit(ChatEvent::Error {
                message: err.to_string(),
            })
            .await;
            return TurnEnd::Failed;
        }
    };

    // Full history including the message just stored.
    let history = match state.conversations.get(conversation_id).await {
        Some(conversation) => conversation.messages,
        None => {
            sink.emit(ChatEvent::Error {
                message: "conversation deleted mid-turn".to_string(),
            })
            .await;
            return TurnEnd::Failed;
        }
    };

    let mut stream = match agent.stream(history).await {
        Ok(stream) => stream,
        Err(err) => {
            sink.emit(ChatEvent::Error {
                message: err.to_string(),
            })
            .await;
            return TurnEnd::Failed;
        }
    };

    let mut accumulated = String::new();
    let mut tool_calls: Vec<ToolCallRecord> = Vec::new();

    while let Some(event) = stream.next().await {
        match event {
            Ok(AgentStreamEvent::Token { content }) => {
                accumulated.push_str(&content);
                if !sink.emit(ChatEvent::Token { content }).await {
                    return TurnEnd::ClientGone;
                }
            }
            Ok(AgentStreamEvent::ToolCall(call)) => {
                tool_calls.push(call.clone());
                if !sink.emit(ChatEvent::ToolCall(call)).await {
                    return TurnEnd::ClientGone;
                }
            }
            Ok(AgentStreamEvent::ToolOutput {
                tool_name,
                tool_call_id,
                content,
            }) => {
                let mut tool_message = Message::new(MessageRole::Tool, content.clone());
                tool_message.tool_name = Some(tool_name.clone());
                tool_message.tool_call_id = tool_call_id.clone();
                let _ = state
                    .conversations
                    .push_message(conversation_id, tool_message)
                    .await;

                let delivered = sink
                    .emit(ChatEvent::ToolOutput {
                        tool_name,
                        tool_call_id,
                        content,
                    })
                    .await;
                if !delivered {
                    return TurnEnd::ClientGone;
                }
            }
            Err(err) => {
                sink.emit(ChatEvent::Error {
                    message: err.to_string(),
                })
                .await;
                return TurnEnd::Failed;
            }
        }
    }

    if !accumulated.is_empty() || !tool_calls.is_empty() {
        let mut ai = Message::new(MessageRole::Ai, accumulated);
        ai.tool_calls = tool_calls;
        let _ = state.conversations.push_message(conversation_id, ai).await;
    }

    if sink.emit(ChatEvent::MessageEnd).await {
        TurnEnd::Completed
    } else {
        TurnEnd::ClientGone
    }
}
