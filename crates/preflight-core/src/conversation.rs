//! Chat conversation state held by the relay.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;
use crate::now_epoch_secs;

/// One chat conversation: identity, agent binding, and transcript.
///
/// Conversations live in-process only; they do not survive a restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: Uuid,
    pub agent_id: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Conversation {
    pub fn new(agent_id: impl Into<String>, model: impl Into<String>, title: Option<String>) -> Self {
        let now = now_epoch_secs();
        Conversation {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            model: model.into(),
            title,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a message and bumps `updated_at`.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = now_epoch_secs();
    }

    /// Drops all messages, keeping the conversation id and binding.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.updated_at = now_epoch_secs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageRole;

    #[test]
    fn clear_keeps_identity() {
        let mut conversation = Conversation::new("support", "gpt-4o-mini", Some("triage".to_string()));
        let id = conversation.id;
        conversation.push_message(Message::new(MessageRole::Human, "hi"));
        conversation.clear();
        assert_eq!(conversation.id, id);
        assert!(conversation.messages.is_empty());
        assert_eq!(conversation.title.as_deref(), Some("triage"));
    }
}
