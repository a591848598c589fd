//! Message and agent-response wire types.
//!
//! An [`AgentResponse`] is the opaque structured record returned by the user
//! agent. The orchestrator never inspects message text beyond extracting
//! tool-call names and token usage.

use serde::{Deserialize, Serialize};

/// Role of a message in an agent transcript.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Human,
    Ai,
    Tool,
    System,
}

/// A named, argument-bearing tool invocation recorded on an AI message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Token accounting attached to a message by the agent, when available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub total: u64,
}

/// One message in an agent transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Tool calls issued by an AI message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Name of the tool that produced a tool-output message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Identifier correlating a tool-output message with its tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl Message {
    /// A plain message with the given role and content and nothing else.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
            tool_call_id: None,
            token_usage: None,
        }
    }
}

/// Structured record returned by the user agent for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub messages: Vec<Message>,
}

impl AgentResponse {
    /// Names of every tool call across all messages, in transcript order.
    ///
    /// Repeated calls to the same tool appear once per call; the result is
    /// the observed tool-call multiset.
    pub fn tool_call_names(&self) -> Vec<String> {
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .map(|tc| tc.name.clone())
            .collect()
    }

    /// Sum of `token_usage.total` across messages that carry it.
    pub fn total_tokens(&self) -> u64 {
        self.messages
            .iter()
            .filter_map(|m| m.token_usage.map(|u| u.total))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ai_message_with_calls(names: &[&str]) -> Message {
        let mut msg = Message::new(MessageRole::Ai, "done");
        msg.tool_calls = names
            .iter()
            .map(|n| ToolCallRecord {
                name: n.to_string(),
                args: serde_json::json!({}),
                id: None,
            })
            .collect();
        msg
    }

    #[test]
    fn tool_call_names_preserve_multiplicity_and_order() {
        let response = AgentResponse {
            messages: vec![
                ai_message_with_calls(&["lookup", "lookup"]),
                Message::new(MessageRole::Tool, "42"),
                ai_message_with_calls(&["summarize"]),
            ],
        };
        assert_eq!(response.tool_call_names(), vec!["lookup", "lookup", "summarize"]);
    }

    #[test]
    fn total_tokens_sums_only_messages_with_usage() {
        let mut with_usage = Message::new(MessageRole::Ai, "a");
        with_usage.token_usage = Some(TokenUsage { total: 120 });
        let response = AgentResponse {
            messages: vec![
                with_usage.clone(),
                Message::new(MessageRole::Human, "b"),
                with_usage,
            ],
        };
        assert_eq!(response.total_tokens(), 240);
    }

    #[test]
    fn response_round_trips_through_json() {
        let mut msg = Message::new(MessageRole::Ai, "pong");
        msg.tool_calls.push(ToolCallRecord {
            name: "get_weather".to_string(),
            args: serde_json::json!({"city": "Berlin"}),
            id: Some("call_1".to_string()),
        });
        let response = AgentResponse { messages: vec![msg] };

        let raw = serde_json::to_string(&response).unwrap();
        let parsed: AgentResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, response);
    }
}
