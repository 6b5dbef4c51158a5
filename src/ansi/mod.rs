//! # ANSI-aware Text Compositor
//!
//! Measures and slices styled terminal text by *visible* width. A line is
//! treated as a sequence of [`Run`]s: plain text, or a single escape
//! sequence. Escape sequences have zero width and are never split.
//!
//! ## Recognized sequences
//!
//! | Start | Terminator | Example |
//! |-------|------------|---------|
//! | `ESC [` (CSI) | final byte in `0x40..=0x7E` | `\x1b[1;31m` |
//! | `ESC ]` (OSC) | BEL or `ESC \` | `\x1b]0;title\x07` |
//! | `ESC` + one char | that char | `\x1b7` |
//!
//! A sequence whose terminator never arrives is reported as
//! [`Run::Partial`]. Width accounting ignores it and the slicing functions
//! drop it, so a dangling escape can never swallow the visible text that a
//! caller appends afterwards.
//!
//! Width is counted in `char`s.

pub mod sanitize;
pub mod stream;

pub use sanitize::{
    hex_to_ansi_background, parse_hex_rgb, sanitize_modal_background, should_restore_background,
    BackgroundSanitizer,
};
pub use stream::{strip_osc, StreamFilter};

/// Plain SGR reset.
pub const RESET: &str = "\x1b[0m";

const ESC: char = '\x1b';
const BEL: char = '\x07';

/// One maximal piece of a styled line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Run<'a> {
    /// Visible text with no escape bytes in it.
    Text(&'a str),
    /// One complete escape sequence.
    Escape(&'a str),
    /// An escape sequence cut off before its terminator.
    Partial(&'a str),
}

/// Iterator over the [`Run`]s of a string.
#[derive(Debug, Clone)]
pub struct Runs<'a> {
    rest: &'a str,
}

/// Split `s` into text and escape runs.
pub fn runs(s: &str) -> Runs<'_> {
    Runs { rest: s }
}

impl<'a> Iterator for Runs<'a> {
    type Item = Run<'a>;

    fn next(&mut self) -> Option<Run<'a>> {
        if self.rest.is_empty() {
            return None;
        }

        if !self.rest.starts_with(ESC) {
            let end = self.rest.find(ESC).unwrap_or(self.rest.len());
            let (text, rest) = self.rest.split_at(end);
            self.rest = rest;
            return Some(Run::Text(text));
        }

        match escape_len(self.rest) {
            Some(len) => {
                let (seq, rest) = self.rest.split_at(len);
                self.rest = rest;
                Some(Run::Escape(seq))
            }
            None => {
                let seq = self.rest;
                self.rest = "";
                Some(Run::Partial(seq))
            }
        }
    }
}

/// Byte length of the escape sequence at the start of `s`, or `None` when
/// the input ends before the terminator. `s` must start with ESC.
fn escape_len(s: &str) -> Option<usize> {
    let mut chars = s.char_indices().skip(1);
    let (_, kind) = chars.next()?;

    match kind {
        '[' => {
            for (i, c) in chars {
                if ('\u{40}'..='\u{7e}').contains(&c) {
                    return Some(i + c.len_utf8());
                }
            }
            None
        }
        ']' => {
            let mut prev_esc = false;
            for (i, c) in chars {
                if c == BEL {
                    return Some(i + 1);
                }
                if prev_esc && c == '\\' {
                    return Some(i + 1);
                }
                prev_esc = c == ESC;
            }
            None
        }
        other => Some(1 + other.len_utf8()),
    }
}

/// Number of visible characters in `line`.
pub fn visible_width(line: &str) -> usize {
    runs(line)
        .map(|run| match run {
            Run::Text(t) => t.chars().count(),
            Run::Escape(_) | Run::Partial(_) => 0,
        })
        .sum()
}

/// Prefix of `line` holding exactly `min(n, visible_width(line))` visible
/// characters. Escape sequences that sit before the last kept character are
/// preserved verbatim; anything after it is dropped.
pub fn truncate_to_width(line: &str, n: usize) -> String {
    let mut out = String::with_capacity(line.len().min(n * 4));
    let mut count = 0;

    for run in runs(line) {
        if count >= n {
            break;
        }
        match run {
            Run::Escape(seq) => out.push_str(seq),
            Run::Partial(_) => {}
            Run::Text(text) => {
                for c in text.chars() {
                    if count == n {
                        break;
                    }
                    out.push(c);
                    count += 1;
                }
            }
        }
    }

    out
}

/// Remainder of `line` after skipping the first `n` visible characters.
///
/// Style sequences seen inside the skipped region are replayed in front of
/// the remainder so text that was styled before the cut keeps its style after
/// it. A reset inside the skipped region clears what was collected so far.
pub fn suffix_after_width(line: &str, n: usize) -> String {
    if n == 0 {
        return runs(line)
            .filter(|run| !matches!(run, Run::Partial(_)))
            .map(|run| match run {
                Run::Text(s) | Run::Escape(s) | Run::Partial(s) => s,
            })
            .collect();
    }

    let mut carried: Vec<&str> = Vec::new();
    let mut rest = String::new();
    let mut count = 0;
    let mut has_visible = false;

    for run in runs(line) {
        match run {
            Run::Partial(_) => {}
            Run::Escape(seq) => {
                if count < n {
                    if is_sgr(seq) {
                        if is_sgr_reset(seq) {
                            carried.clear();
                        } else {
                            carried.push(seq);
                        }
                    }
                } else {
                    rest.push_str(seq);
                }
            }
            Run::Text(text) => {
                if count >= n {
                    rest.push_str(text);
                    has_visible = true;
                    continue;
                }
                for (i, _) in text.char_indices() {
                    if count == n {
                        rest.push_str(&text[i..]);
                        has_visible = true;
                        break;
                    }
                    count += 1;
                }
            }
        }
    }

    if !has_visible {
        return if count < n { String::new() } else { rest };
    }

    let mut out = carried.concat();
    out.push_str(&rest);
    out
}

/// Pad `line` with spaces to `width` visible characters, truncating when it
/// is wider. The result always ends with [`RESET`].
pub fn fit_to_width(line: &str, width: usize) -> String {
    let current = visible_width(line);
    if current > width {
        let mut out = truncate_to_width(line, width);
        out.push_str(RESET);
        return out;
    }

    let mut out = String::with_capacity(line.len() + width - current + RESET.len() * 2);
    out.push_str(line);
    out.push_str(RESET);
    out.push_str(&" ".repeat(width - current));
    out.push_str(RESET);
    out
}

/// Remove every escape sequence, leaving only visible text.
pub fn strip(line: &str) -> String {
    runs(line)
        .filter_map(|run| match run {
            Run::Text(t) => Some(t),
            Run::Escape(_) | Run::Partial(_) => None,
        })
        .collect()
}

/// Whether `seq` is a CSI sequence ending in `m`.
pub(crate) fn is_sgr(seq: &str) -> bool {
    seq.starts_with("\x1b[") && seq.ends_with('m')
}

fn is_sgr_reset(seq: &str) -> bool {
    seq == "\x1b[0m" || seq == "\x1b[m"
}
