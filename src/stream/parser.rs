// src/stream/parser.rs
// Classifies framed text into stream events

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::StreamMode;

/// SSE data marker for prefixed-JSON records
pub const DATA_PREFIX: &str = "data:";

/// Sentinel some servers send instead of a `done` record
pub const DONE_SENTINEL: &str = "[DONE]";

/// The meaning of one line (or one plain-text fragment)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Text to append to the assistant message
    Content(String),
    /// End of the reply. Carries content that arrived in the same record,
    /// which is appended before the message is finalized.
    Done(Option<String>),
    /// Server reported a failure inside the stream
    Failed(String),
    /// Nothing to do
    Ignored,
}

/// Wire record after the `data: ` prefix. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct Record {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    done: Option<Value>,
    #[serde(default)]
    is_final: Option<Value>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct EventParser {
    mode: StreamMode,
}

impl EventParser {
    pub fn new(mode: StreamMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn parse(&self, line: &str) -> Event {
        match self.mode {
            StreamMode::PrefixedJson => parse_prefixed(line),
            StreamMode::PlainText => parse_plain(line),
        }
    }
}

// Whitespace is content once a reply has started; the accumulator drops it
// only before the first visible text.
fn parse_plain(text: &str) -> Event {
    if text.is_empty() {
        return Event::Ignored;
    }
    Event::Content(text.to_string())
}

fn parse_prefixed(line: &str) -> Event {
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        if !line.trim().is_empty() {
            debug!("Skipping non-data line: {:?}", preview(line));
        }
        return Event::Ignored;
    };
    let data = rest.strip_prefix(' ').unwrap_or(rest).trim_end();

    if data == DONE_SENTINEL {
        return Event::Done(None);
    }

    let record = match serde_json::from_str::<Record>(data) {
        Ok(record) => record,
        Err(e) => {
            debug!("Ignoring malformed data line: {} - {:?}", e, preview(data));
            return Event::Ignored;
        }
    };

    let content = record.content.as_ref().and_then(content_text);

    if record.kind.as_deref() == Some("error") {
        return Event::Failed(content.unwrap_or_else(|| "stream error".to_string()));
    }

    let done = record.done.as_ref().is_some_and(truthy) || record.is_final.as_ref().is_some_and(truthy);

    match (done, content) {
        (true, content) => Event::Done(content),
        (false, Some(text)) => Event::Content(text),
        (false, None) => Event::Ignored,
    }
}

/// Truthiness the way the dashboard's JSON producers mean it
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn content_text(value: &Value) -> Option<String> {
    if !truthy(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn preview(s: &str) -> &str {
    match s.char_indices().nth(100) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
