//! In-process conversation state and the chat agent catalog.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use preflight_core::{ChatAgentFactory, ChatAgentInfo, Conversation, Message};

/// The chat agents the embedding project exposes, keyed by id.
pub struct AgentCatalog {
    agents: Vec<Arc<dyn ChatAgentFactory>>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<Arc<dyn ChatAgentFactory>>) -> Self {
        AgentCatalog { agents }
    }

    pub fn list(&self) -> Vec<ChatAgentInfo> {
        self.agents.iter().map(|a| a.info()).collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ChatAgentFactory>> {
        self.agents.iter().find(|a| a.info().id == id).cloned()
    }
}

/// Releases the conversation's stream slot when dropped.
pub struct StreamGuard {
    active: Arc<DashMap<Uuid, ()>>,
    id: Uuid,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

/// Holds all conversations for the running process.
///
/// Mutations are serialized by one async mutex; at most one response stream
/// may be active per conversation at a time.
pub struct ConversationStore {
    conversations: Mutex<HashMap<Uuid, Conversation>>,
    active_streams: Arc<DashMap<Uuid, ()>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        ConversationStore {
            conversations: Mutex::new(HashMap::new()),
            active_streams: Arc::new(DashMap::new()),
        }
    }

    pub async fn create(
        &self,
        agent_id: impl Into<String>,
        model: impl Into<String>,
        title: Option<String>,
    ) -> Conversation {
        let conversation = Conversation::new(agent_id, model, title);
        let mut guard = self.conversations.lock().await;
        guard.insert(conversation.id, conversation.clone());
        conversation
    }

    /// All conversations, most recently updated first.
    pub async fn list(&self) -> Vec<Conversation> {
        let guard = self.conversations.lock().await;
        let mut conversations: Vec<Conversation> = guard.values().cloned().collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        conversations
    }

    pub async fn get(&self, id: Uuid) -> Option<Conversation> {
        self.conversations.lock().await.get(&id).cloned()
    }

    pub async fn delete(&self, id: Uuid) -> bool {
        self.conversations.lock().await.remove(&id).is_some()
    }

    /// Drops a conversation's messages, keeping its id and binding.
    pub async fn clear(&self, id: Uuid) -> Option<Conversation> {
        let mut guard = self.conversations.lock().await;
        let conversation = guard.get_mut(&id)?;
        conversation.clear();
        Some(conversation.clone())
    }

    /// Appends one message, returning the updated conversation.
    pub async fn push_message(&self, id: Uuid, message: Message) -> Option<Conversation> {
        let mut guard = self.conversations.lock().await;
        let conversation = guard.get_mut(&id)?;
        conversation.push_message(message);
        Some(conversation.clone())
    }

    /// Claims the conversation's single stream slot.
    ///
    /// Returns `None` while another stream for the same conversation is in
    /// flight; the returned guard frees the slot on drop.
    pub fn begin_stream(&self, id: Uuid) -> Option<StreamGuard> {
        if self.active_streams.insert(id, ()).is_some() {
            return None;
        }
        Some(StreamGuard {
            active: Arc::clone(&self.active_streams),
            id,
        })
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
