// src/stream/lines.rs
// Newline framing with a carried-over partial line

use tracing::debug;

use super::TailPolicy;

/// Splits decoded text into complete lines.
///
/// The pending buffer never holds a newline. One splitter serves exactly one
/// stream session.
#[derive(Debug)]
pub struct LineSplitter {
    pending: String,
    tail: TailPolicy,
}

impl LineSplitter {
    pub fn new(tail: TailPolicy) -> Self {
        Self {
            pending: String::new(),
            tail,
        }
    }

    /// Feed decoded text, returning every line it completes (terminator
    /// stripped). A `\r` right before the `\n` is stripped too.
    pub fn feed(&mut self, text: &str) -> Vec<String> {
        self.pending.push_str(text);

        let Some(last) = self.pending.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete[..last]
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect()
    }

    /// End of stream: hand back the unterminated tail if the policy keeps it.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        let tail = std::mem::take(&mut self.pending);
        match self.tail {
            TailPolicy::Emit => Some(tail),
            TailPolicy::Discard => {
                debug!("Discarding unterminated tail ({} bytes)", tail.len());
                None
            }
        }
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new(TailPolicy::default())
    }
}
