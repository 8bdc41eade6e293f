// src/chat/conversation.rs
// Ordered conversation log fed by message snapshots

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ChatTurn, HistoryRequest};
use crate::stream::{Message, Role, SnapshotSink};

/// Messages in insertion order with unique ids.
///
/// Snapshots for the streaming message replace the earlier snapshot in
/// place; everything else is appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    session_id: String,
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Append a user turn and return its id
    pub fn push_user(&mut self, content: impl Into<String>) -> String {
        let message = Message::user(content);
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Insert a new message or replace the one with the same id
    pub fn upsert(&mut self, message: Message) {
        match self.messages.iter_mut().rev().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
    }

    pub fn clear(&mut self) {
        debug!("Clearing {} message(s) from session {}", self.messages.len(), self.session_id);
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Turns worth sending back as context (non-empty content only)
    pub fn history(&self) -> Vec<ChatTurn> {
        self.messages
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(ChatTurn::from)
            .collect()
    }

    pub fn history_request(&self) -> HistoryRequest {
        HistoryRequest {
            messages: self.history(),
            session_id: self.session_id.clone(),
        }
    }
}

impl SnapshotSink for ConversationLog {
    fn publish(&mut self, message: &Message) {
        self.upsert(message.clone());
    }
}
