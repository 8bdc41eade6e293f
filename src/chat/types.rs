// src/chat/types.rs
// Request payloads for the chat endpoints

use serde::{Deserialize, Serialize};

use crate::stream::{Message, Role};

/// Backend `/chat`: one question, optionally scoped to an analysis run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Agent service `/query/stream`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentQuery {
    pub message: String,
}

/// One prior turn sent back to the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Full conversation plus the session it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRequest {
    pub messages: Vec<ChatTurn>,
    pub session_id: String,
}

/// Any body the client can POST
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ChatPayload {
    Question(QuestionRequest),
    Agent(AgentQuery),
    History(HistoryRequest),
}

impl ChatPayload {
    pub fn question(question: impl Into<String>, run_id: Option<String>) -> Self {
        Self::Question(QuestionRequest {
            question: question.into(),
            run_id,
        })
    }

    pub fn agent(message: impl Into<String>) -> Self {
        Self::Agent(AgentQuery {
            message: message.into(),
        })
    }
}
