// src/stream/mod.rs
// Streaming chat response assembly: bytes -> text -> events -> message

mod accumulator;
mod controller;
mod decoder;
mod lines;
mod parser;

pub use accumulator::{Message, MessageAccumulator, MessageStatus, Role};
pub use controller::{DEFAULT_APOLOGY, SnapshotSink, StreamController, StreamOutcome, StreamState};
pub use decoder::ByteDecoder;
pub use lines::LineSplitter;
pub use parser::{Event, EventParser, DATA_PREFIX, DONE_SENTINEL};

use std::fmt;
use std::str::FromStr;

/// Which wire sub-format the response body uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// `data: {json}` lines carrying `content` / `done`
    PrefixedJson,
    /// Raw text, completion only at end of stream
    #[default]
    PlainText,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown stream mode '{0}' (expected 'plain' or 'json')")]
pub struct UnknownStreamMode(String);

impl FromStr for StreamMode {
    type Err = UnknownStreamMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "prefixed-json" | "prefixed_json" | "sse" => Ok(Self::PrefixedJson),
            "plain" | "text" | "plain-text" | "plain_text" => Ok(Self::PlainText),
            _ => Err(UnknownStreamMode(s.to_string())),
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrefixedJson => f.write_str("json"),
            Self::PlainText => f.write_str("plain"),
        }
    }
}

/// What to do with text left after the last newline when the stream ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TailPolicy {
    /// Treat it as a final line
    #[default]
    Emit,
    /// Drop it
    Discard,
}

impl TailPolicy {
    pub fn from_flag(flush_tail: bool) -> Self {
        if flush_tail { Self::Emit } else { Self::Discard }
    }
}
