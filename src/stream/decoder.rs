// src/stream/decoder.rs
// Incremental UTF-8 decoding across chunk boundaries

use tracing::debug;

const REPLACEMENT: char = '\u{FFFD}';

/// Stateful UTF-8 decoder.
///
/// Bytes of a multi-byte sequence that is cut by a chunk boundary are held
/// back until the next call. Invalid sequences become U+FFFD; decoding
/// never fails.
#[derive(Debug, Default)]
pub struct ByteDecoder {
    carry: Vec<u8>,
}

impl ByteDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk. Pass `is_final = true` exactly once, on the last
    /// chunk (or an empty slice at end of stream), so a truncated trailing
    /// sequence is flushed as a replacement character instead of dropped.
    pub fn decode(&mut self, chunk: &[u8], is_final: bool) -> String {
        self.carry.extend_from_slice(chunk);

        let bytes = std::mem::take(&mut self.carry);
        let mut out = String::with_capacity(bytes.len());
        let mut pos = 0;

        while pos < bytes.len() {
            match std::str::from_utf8(&bytes[pos..]) {
                Ok(s) => {
                    out.push_str(s);
                    pos = bytes.len();
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&bytes[pos..pos + valid]));
                    pos += valid;

                    match e.error_len() {
                        Some(len) => {
                            debug!("Replacing {} invalid byte(s) at offset {}", len, pos);
                            out.push(REPLACEMENT);
                            pos += len;
                        }
                        // Incomplete sequence at the end of the input
                        None if is_final => {
                            debug!("Stream ended inside a multi-byte sequence");
                            out.push(REPLACEMENT);
                            pos = bytes.len();
                        }
                        None => {
                            self.carry.extend_from_slice(&bytes[pos..]);
                            pos = bytes.len();
                        }
                    }
                }
            }
        }

        out
    }

    /// Bytes currently held back waiting for the rest of a sequence
    pub fn pending_len(&self) -> usize {
        self.carry.len()
    }
}
