//! Agent collaborator traits.
//!
//! The orchestrator drives two agent shapes: [`QueryAgent`] for the test
//! pipeline (one prompt in, one structured response out) and
//! [`StreamingChatAgent`] for the chat relay (full history in, a tagged
//! event stream out). Both are supplied by the embedding project.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::message::{AgentResponse, Message, ToolCallRecord};

/// Errors raised by agent collaborators.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent query failed: {0}")]
    QueryFailed(String),

    #[error("failed to build agent: {0}")]
    BuildFailed(String),

    #[error("agent stream failed: {0}")]
    StreamFailed(String),
}

/// The agent under test: `query(prompt) -> structured response`.
#[async_trait]
pub trait QueryAgent: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<AgentResponse, AgentError>;
}

/// Catalog entry describing a chat agent and the models it accepts.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatAgentInfo {
    pub id: String,
    pub name: String,
    pub models: Vec<String>,
}

/// One fragment of a streaming chat response.
///
/// The relay forwards these to the client in exactly the order the agent
/// produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStreamEvent {
    Token { content: String },
    ToolCall(ToolCallRecord),
    ToolOutput {
        tool_name: String,
        tool_call_id: Option<String>,
        content: String,
    },
}

/// Tagged event stream produced by one chat turn.
pub type AgentEventStream = BoxStream<'static, Result<AgentStreamEvent, AgentError>>;

/// A stateful streaming agent bound to one model.
#[async_trait]
pub trait StreamingChatAgent: Send + Sync {
    /// Starts one response stream for the given conversation history.
    async fn stream(&self, history: Vec<Message>) -> Result<AgentEventStream, AgentError>;
}

/// Builds a fresh [`StreamingChatAgent`] per message, so hot-reloaded agent
/// code takes effect on the next turn.
#[async_trait]
pub trait ChatAgentFactory: Send + Sync {
    fn info(&self) -> ChatAgentInfo;

    async fn build(&self, model: &str) -> Result<Box<dyn StreamingChatAgent>, AgentError>;
}
