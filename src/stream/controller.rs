// src/stream/controller.rs
// Drives one response body through decoder -> framer -> parser -> accumulator

use std::fmt::Display;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    ByteDecoder, Event, EventParser, LineSplitter, Message, MessageAccumulator, StreamMode,
    TailPolicy,
};

/// Shown in place of the reply when the transport fails
pub const DEFAULT_APOLOGY: &str =
    "Sorry, I couldn't get a response from the assistant. Please check your connection and try again.";

/// Receives message snapshots in chunk-arrival order
pub trait SnapshotSink {
    fn publish(&mut self, message: &Message);
}

impl<F> SnapshotSink for F
where
    F: FnMut(&Message),
{
    fn publish(&mut self, message: &Message) {
        self(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// How a run ended and the message it left behind
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub state: StreamState,
    pub message: Option<Message>,
}

impl StreamOutcome {
    pub fn content(&self) -> Option<&str> {
        self.message.as_ref().map(|m| m.content.as_str())
    }
}

/// Prefixed JSON is line framed; plain text is consumed fragment by fragment
#[derive(Debug)]
enum Framer {
    Lines(LineSplitter),
    Fragments,
}

impl Framer {
    fn new(mode: StreamMode, tail: TailPolicy) -> Self {
        match mode {
            StreamMode::PrefixedJson => Self::Lines(LineSplitter::new(tail)),
            StreamMode::PlainText => Self::Fragments,
        }
    }

    fn feed(&mut self, text: &str) -> Vec<String> {
        match self {
            Self::Lines(splitter) => splitter.feed(text),
            Self::Fragments if text.is_empty() => Vec::new(),
            Self::Fragments => vec![text.to_string()],
        }
    }

    fn flush(&mut self) -> Option<String> {
        match self {
            Self::Lines(splitter) => splitter.flush(),
            Self::Fragments => None,
        }
    }
}

enum Step {
    Continue,
    Done,
    Failed,
}

/// One controller per request. Buffers and accumulator state live inside
/// `run`, so nothing carries over between sessions.
#[derive(Debug)]
pub struct StreamController {
    mode: StreamMode,
    tail: TailPolicy,
    apology: String,
    cancel: CancellationToken,
}

impl StreamController {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            tail: TailPolicy::default(),
            apology: DEFAULT_APOLOGY.to_string(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_tail_policy(mut self, tail: TailPolicy) -> Self {
        self.tail = tail;
        self
    }

    pub fn with_apology(mut self, apology: impl Into<String>) -> Self {
        self.apology = apology.into();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run at its next suspension point
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Consume `source` until end of stream, `Done`, a read error, or
    /// cancellation. The source is dropped (releasing the connection) on
    /// every exit path.
    pub async fn run<S, B, E, K>(self, source: S, sink: &mut K) -> StreamOutcome
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        K: SnapshotSink + ?Sized,
    {
        let Self {
            mode,
            tail,
            apology,
            cancel,
        } = self;

        let mut decoder = ByteDecoder::new();
        let mut framer = Framer::new(mode, tail);
        let parser = EventParser::new(mode);
        let mut acc = MessageAccumulator::new(apology);
        let mut chunks = 0usize;

        tokio::pin!(source);
        debug!("Stream state: {:?} -> {:?} (mode {})", StreamState::Idle, StreamState::Streaming, mode);

        let state = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StreamState::Cancelled,
                next = source.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    chunks += 1;
                    let text = decoder.decode(chunk.as_ref(), false);
                    match dispatch(framer.feed(&text), &parser, &mut acc, sink) {
                        Step::Continue => {}
                        Step::Done => break StreamState::Completed,
                        Step::Failed => break StreamState::Failed,
                    }
                }
                Some(Err(e)) => {
                    warn!("Stream read failed after {} chunk(s): {}", chunks, e);
                    sink.publish(acc.fail());
                    break StreamState::Failed;
                }
                None => {
                    let mut units = framer.feed(&decoder.decode(&[], true));
                    units.extend(framer.flush());
                    if let Step::Failed = dispatch(units, &parser, &mut acc, sink) {
                        break StreamState::Failed;
                    }
                    // End of stream is an implicit Done in both modes
                    if let Some(message) = acc.finish() {
                        sink.publish(message);
                    }
                    break StreamState::Completed;
                }
            }
        };

        match state {
            StreamState::Cancelled => info!("Stream cancelled after {} chunk(s)", chunks),
            _ => debug!("Stream state: {:?} -> {:?} after {} chunk(s)", StreamState::Streaming, state, chunks),
        }

        StreamOutcome {
            state,
            message: acc.into_message(),
        }
    }

    /// Transport failed before any body arrived (bad status, connect error)
    pub fn fail<E, K>(self, error: &E, sink: &mut K) -> StreamOutcome
    where
        E: Display + ?Sized,
        K: SnapshotSink + ?Sized,
    {
        warn!("Stream failed before reading: {}", error);
        let mut acc = MessageAccumulator::new(self.apology);
        sink.publish(acc.fail());

        StreamOutcome {
            state: StreamState::Failed,
            message: acc.into_message(),
        }
    }
}

fn dispatch<K>(
    units: Vec<String>,
    parser: &EventParser,
    acc: &mut MessageAccumulator,
    sink: &mut K,
) -> Step
where
    K: SnapshotSink + ?Sized,
{
    for unit in units {
        let event = parser.parse(&unit);
        let step = match event {
            Event::Done(_) => Step::Done,
            Event::Failed(_) => Step::Failed,
            Event::Content(_) | Event::Ignored => Step::Continue,
        };

        if let Some(message) = acc.apply(event) {
            sink.publish(message);
        }

        if !matches!(step, Step::Continue) {
            return step;
        }
    }
    Step::Continue
}
