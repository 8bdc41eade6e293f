// src/stream/accumulator.rs
// Builds the in-flight assistant message from stream events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Still receiving content
    Streaming,
    /// Finalized by `Done` or end of stream
    Complete,
    /// Content replaced by the apology text
    Failed,
}

/// One conversational turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    fn new(role: Role, content: String, status: MessageStatus) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            status,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), MessageStatus::Complete)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), MessageStatus::Streaming)
    }

    pub fn is_final(&self) -> bool {
        self.status != MessageStatus::Streaming
    }
}

/// Owns the single in-flight assistant message of one request.
///
/// The message is created lazily on the first non-empty content so the UI
/// never shows an empty bubble. Once finalized it no longer changes.
#[derive(Debug)]
pub struct MessageAccumulator {
    message: Option<Message>,
    finalized: bool,
    apology: String,
}

impl MessageAccumulator {
    pub fn new(apology: impl Into<String>) -> Self {
        Self {
            message: None,
            finalized: false,
            apology: apology.into(),
        }
    }

    /// Apply one event. Returns the message when the event changed it.
    pub fn apply(&mut self, event: Event) -> Option<&Message> {
        match event {
            Event::Ignored => None,
            Event::Content(text) => self.append(text),
            Event::Done(tail) => {
                if let Some(text) = tail {
                    self.append(text);
                }
                self.finish()
            }
            Event::Failed(reason) => {
                warn!("Server reported stream failure: {}", reason);
                Some(self.fail())
            }
        }
    }

    fn append(&mut self, text: String) -> Option<&Message> {
        if self.finalized {
            debug!("Dropping {} bytes of content after finalize", text.len());
            return None;
        }
        if text.is_empty() {
            return None;
        }
        // Leading keep-alive whitespace must not open an empty bubble
        if self.message.is_none() && text.trim().is_empty() {
            debug!("Skipping {} byte(s) of leading whitespace", text.len());
            return None;
        }

        match self.message {
            Some(ref mut message) => {
                message.content.push_str(&text);
            }
            None => {
                let message = Message::assistant(text);
                debug!("Materialized assistant message {}", message.id);
                self.message = Some(message);
            }
        }
        self.message.as_ref()
    }

    /// Finalize the message as-is. No-op when nothing was ever streamed.
    pub fn finish(&mut self) -> Option<&Message> {
        if self.finalized {
            return None;
        }
        self.finalized = true;

        let message = self.message.as_mut()?;
        message.status = MessageStatus::Complete;
        Some(&*message)
    }

    /// Transport failure: replace any partial text with the apology, or
    /// create a message carrying it when none exists yet.
    pub fn fail(&mut self) -> &Message {
        self.finalized = true;

        let message = self
            .message
            .get_or_insert_with(|| Message::assistant(String::new()));
        message.content.clone_from(&self.apology);
        message.status = MessageStatus::Failed;
        message
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn into_message(self) -> Option<Message> {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORRY: &str = "Sorry, something went wrong.";

    fn content(text: &str) -> Event {
        Event::Content(text.to_string())
    }

    #[test]
    fn test_lazy_creation_then_append() {
        let mut acc = MessageAccumulator::new(SORRY);
        assert!(acc.message().is_none());

        let id = acc.apply(content("Hi")).map(|m| m.id.clone());
        let second = acc.apply(content(" there")).cloned();

        let second = second.expect("message after append");
        assert_eq!(Some(second.id.clone()), id);
        assert_eq!(second.content, "Hi there");
        assert_eq!(second.role, Role::Assistant);
        assert_eq!(second.status, MessageStatus::Streaming);
    }

    #[test]
    fn test_whitespace_only_before_and_after_first_content() {
        let mut acc = MessageAccumulator::new(SORRY);
        assert!(acc.apply(content(" ")).is_none());
        assert!(acc.apply(content("\n")).is_none());
        assert!(acc.message().is_none());

        acc.apply(content("Hello"));
        acc.apply(content(" "));
        acc.apply(content("world"));
        acc.apply(content("\n\n"));
        assert_eq!(acc.message().map(|m| m.content.as_str()), Some("Hello world\n\n"));
    }

    #[test]
    fn test_ignored_changes_nothing() {
        let mut acc = MessageAccumulator::new(SORRY);
        acc.apply(content("Hi"));
        let before = acc.message().cloned();

        assert!(acc.apply(Event::Ignored).is_none());
        assert_eq!(acc.message().cloned(), before);
        assert!(!acc.is_finalized());
    }

    #[test]
    fn test_done_without_content_surfaces_nothing() {
        let mut acc = MessageAccumulator::new(SORRY);
        assert!(acc.apply(Event::Done(None)).is_none());
        assert!(acc.message().is_none());
        assert!(acc.is_finalized());
    }

    #[test]
    fn test_content_after_done_is_dropped() {
        let mut acc = MessageAccumulator::new(SORRY);
        acc.apply(content("Hi"));
        let done = acc.apply(Event::Done(None)).cloned().expect("finalized message");
        assert_eq!(done.status, MessageStatus::Complete);

        assert!(acc.apply(content(" more")).is_none());
        assert_eq!(acc.message().map(|m| m.content.as_str()), Some("Hi"));
    }

    #[test]
    fn test_done_with_content_appends_first() {
        let mut acc = MessageAccumulator::new(SORRY);
        acc.apply(content("Hello"));
        let msg = acc.apply(Event::Done(Some(" world".into()))).cloned().expect("message");
        assert_eq!(msg.content, "Hello world");
        assert!(msg.is_final());
    }

    #[test]
    fn test_error_overwrites_partial_content() {
        let mut acc = MessageAccumulator::new(SORRY);
        acc.apply(content("Hello wor"));
        let id = acc.message().map(|m| m.id.clone());

        let failed = acc.fail().clone();
        assert_eq!(failed.content, SORRY);
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(Some(failed.id), id);
    }

    #[test]
    fn test_error_before_content_synthesizes_message() {
        let mut acc = MessageAccumulator::new(SORRY);
        let failed = acc.fail().clone();
        assert_eq!(failed.content, SORRY);
        assert_eq!(failed.role, Role::Assistant);
    }

    #[test]
    fn test_failed_event_takes_error_path() {
        let mut acc = MessageAccumulator::new(SORRY);
        acc.apply(content("partial"));
        let msg = acc.apply(Event::Failed("boom".into())).cloned().expect("message");
        assert_eq!(msg.content, SORRY);
        assert!(acc.is_finalized());
    }

    #[test]
    fn test_at_most_one_message() {
        let mut acc = MessageAccumulator::new(SORRY);
        let ids: Vec<String> = ["a", "b", "c", "d"]
            .iter()
            .filter_map(|t| acc.apply(content(t)).map(|m| m.id.clone()))
            .collect();
        assert_eq!(ids.len(), 4);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["status"], "complete");
    }
}
