//! # Output Stream Reassembly
//!
//! Reads from a PTY or pipe arrive in arbitrary chunks, so a UTF-8 character
//! or an escape sequence can be split across two reads. [`StreamFilter`]
//! holds back an incomplete tail until the next chunk completes it, then
//! strips OSC sequences (window titles, hyperlinks, clipboard writes), which
//! have no meaning inside a scrollback viewport.
//!
//! ```text
//! chunk 1: "build ok\x1b]0;ti"     -> "build ok"        (held: "\x1b]0;ti")
//! chunk 2: "tle\x07done\n"         -> "done\n"
//! ```

use super::{runs, Run};

/// Largest incomplete escape sequence kept across reads. Anything longer is
/// treated as garbage and discarded up to its terminator.
pub const MAX_HELD_BYTES: usize = 4096;

/// An oversized escape sequence whose remaining bytes are being swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discard {
    /// Ends at BEL or `ESC \`. `after_esc` is set when the last byte was ESC.
    Osc { after_esc: bool },
    /// Ends at a final byte in `0x40..=0x7e`.
    Csi,
}

impl Discard {
    fn starting(partial: &str, tail: &[u8]) -> Option<Self> {
        match partial.as_bytes().get(1) {
            Some(b'[') => Some(Discard::Csi),
            Some(b']') => Some(Discard::Osc {
                after_esc: tail.is_empty() && partial.ends_with('\x1b'),
            }),
            _ => None,
        }
    }

    /// Offset just past the terminator in `bytes`, or the state to carry
    /// into the next chunk. Terminators are ASCII, so scanning bytes is safe
    /// in the middle of UTF-8 text.
    fn scan(self, bytes: &[u8]) -> Result<usize, Self> {
        match self {
            Discard::Csi => bytes
                .iter()
                .position(|b| (0x40..=0x7e).contains(b))
                .map(|i| i + 1)
                .ok_or(self),
            Discard::Osc { mut after_esc } => {
                for (i, &b) in bytes.iter().enumerate() {
                    if b == 0x07 || (after_esc && b == b'\\') {
                        return Ok(i + 1);
                    }
                    after_esc = b == 0x1b;
                }
                Err(Discard::Osc { after_esc })
            }
        }
    }
}

/// Stateful decoder for a child's output byte stream.
#[derive(Debug, Default)]
pub struct StreamFilter {
    held: Vec<u8>,
    discarding: Option<Discard>,
}

impl StreamFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently held back waiting for the next chunk.
    pub fn held_len(&self) -> usize {
        self.held.len()
    }

    /// Feed one chunk and return the text that is safe to display.
    pub fn push(&mut self, mut chunk: &[u8]) -> String {
        if let Some(discard) = self.discarding {
            match discard.scan(chunk) {
                Ok(end) => {
                    self.discarding = None;
                    chunk = &chunk[end..];
                }
                Err(next) => {
                    self.discarding = Some(next);
                    return String::new();
                }
            }
        }

        self.held.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.held);

        let (text, consumed) = decode_utf8_prefix(&bytes);
        let tail = &bytes[consumed..];

        let (complete, partial) = split_partial_escape(&text);
        let mut held = Vec::with_capacity(partial.len() + tail.len());
        held.extend_from_slice(partial.as_bytes());
        held.extend_from_slice(tail);

        if held.len() > MAX_HELD_BYTES {
            tracing::trace!(bytes = held.len(), "discarding oversized partial escape");
            // The tail belongs to the sequence, so both go.
            self.discarding = Discard::starting(partial, tail);
            self.held = if partial.is_empty() { held } else { Vec::new() };
        } else {
            self.held = held;
        }

        strip_osc(complete)
    }

    /// Flush whatever is still held at end of stream. Incomplete escape
    /// sequences are dropped and invalid UTF-8 is replaced.
    pub fn finish(&mut self) -> String {
        self.discarding = None;
        let bytes = std::mem::take(&mut self.held);
        let text = String::from_utf8_lossy(&bytes);
        let (complete, _) = split_partial_escape(&text);
        strip_osc(complete)
    }
}

/// Decode as much of `bytes` as possible. Invalid bytes become U+FFFD; an
/// incomplete character at the very end is left unconsumed.
fn decode_utf8_prefix(bytes: &[u8]) -> (String, usize) {
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
                    Some(bad) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        pos += bad;
                    }
                    None => break,
                }
            }
        }
    }

    (out, pos)
}

/// Split `text` into its complete part and a trailing partial escape.
fn split_partial_escape(text: &str) -> (&str, &str) {
    let mut offset = 0;
    for run in runs(text) {
        match run {
            Run::Partial(seq) => return (&text[..offset], seq),
            Run::Text(s) | Run::Escape(s) => offset += s.len(),
        }
    }
    (text, "")
}

/// Remove complete OSC sequences.
pub fn strip_osc(text: &str) -> String {
    runs(text)
        .filter_map(|run| match run {
            Run::Escape(seq) if seq.starts_with("\x1b]") => None,
            Run::Text(s) | Run::Escape(s) => Some(s),
            Run::Partial(_) => None,
        })
        .collect()
}
