// src/chat/mod.rs

mod client;
mod conversation;
mod error;
mod types;

pub use client::{ChatClient, ChatService};
pub use conversation::ConversationLog;
pub use error::ChatError;
pub use types::{AgentQuery, ChatPayload, ChatTurn, HistoryRequest, QuestionRequest};
