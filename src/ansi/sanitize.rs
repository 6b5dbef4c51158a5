//! # Modal Background Sanitizer
//!
//! Widgets drawn inside a modal do not know the modal has a background
//! color. Every time one of them emits a reset (`ESC[0m`, `ESC[m`) or a
//! background reset (`ESC[49m`), the terminal falls back to its default
//! background and the dialog shows holes. [`BackgroundSanitizer`] appends the
//! modal background escape after each such sequence.
//!
//! A sequence that is already followed by the background escape is left
//! alone, which makes the rewrite idempotent.

use anyhow::{Context, Result};
use regex::Regex;

/// SGR parameter that resets only the background.
const BG_RESET: &str = "49";

/// Rewrites bare resets so they restore a fixed background color.
#[derive(Debug, Clone)]
pub struct BackgroundSanitizer {
    sgr_re: Regex,
    background: String,
}

impl BackgroundSanitizer {
    /// Create a sanitizer restoring `background`, a complete escape such as
    /// `\x1b[48;2;26;26;46m`.
    pub fn new(background: impl Into<String>) -> Result<Self> {
        let sgr_re =
            Regex::new(r"\x1b\[([0-9;]*)m").context("Failed to compile SGR regex pattern")?;
        Ok(Self {
            sgr_re,
            background: background.into(),
        })
    }

    /// The background escape this sanitizer restores.
    pub fn background(&self) -> &str {
        &self.background
    }

    /// Append the background escape after every SGR sequence that resets the
    /// background, unless it is already there.
    pub fn sanitize(&self, text: &str) -> String {
        if self.background.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len() + text.len() / 8);
        let mut last = 0;

        for caps in self.sgr_re.captures_iter(text) {
            let (Some(whole), Some(params)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&text[last..whole.end()]);
            last = whole.end();

            if !should_restore_background(params.as_str()) {
                continue;
            }
            if text[whole.end()..].starts_with(&self.background) {
                continue;
            }
            out.push_str(&self.background);
        }

        out.push_str(&text[last..]);
        out
    }
}

/// Sanitize `text` for a modal whose background escape is `background`.
///
/// Convenience wrapper for one-off calls; long-lived callers should keep a
/// [`BackgroundSanitizer`] around instead.
pub fn sanitize_modal_background(text: &str, background: &str) -> Result<String> {
    Ok(BackgroundSanitizer::new(background)?.sanitize(text))
}

/// Whether an SGR with these parameters leaves the background at the
/// terminal default.
///
/// True for a bare reset (`""`), reset-all (`"0"`), background reset
/// (`"49"`) and any `;`-joined list containing `49`. Explicit background
/// colors such as `48;5;234` are untouched.
pub fn should_restore_background(params: &str) -> bool {
    match params {
        "" | "0" | BG_RESET => true,
        _ => params.split(';').any(|p| p == BG_RESET),
    }
}

/// Convert a `#rrggbb` (or `rrggbb`) color to a 24-bit background escape.
///
/// Returns `None` for anything that is not six hex digits.
pub fn hex_to_ansi_background(hex: &str) -> Option<String> {
    let (r, g, b) = parse_hex_rgb(hex)?;
    Some(format!("\x1b[48;2;{};{};{}m", r, g, b))
}

/// Parse `#rrggbb` or `rrggbb` into its components.
pub fn parse_hex_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BG: &str = "\x1b[48;2;26;26;46m";

    fn sanitizer() -> BackgroundSanitizer {
        BackgroundSanitizer::new(BG).expect("sanitizer")
    }

    #[test]
    fn test_reset_gets_background_appended() {
        assert_eq!(
            sanitizer().sanitize("Hello\x1b[0mWorld"),
            format!("Hello\x1b[0m{}World", BG)
        );
        assert_eq!(
            sanitizer().sanitize("A\x1b[0mB"),
            "A\x1b[0m\x1b[48;2;26;26;46mB"
        );
    }

    #[test]
    fn test_bare_reset_without_params() {
        assert_eq!(sanitizer().sanitize("A\x1b[mB"), format!("A\x1b[m{}B", BG));
    }

    #[test]
    fn test_already_sanitized_is_unchanged() {
        let input = format!("Hello\x1b[0m{}World", BG);
        assert_eq!(sanitizer().sanitize(&input), input);
    }

    #[test]
    fn test_sanitized_prefix_then_bare_reset() {
        let reset_with_bg = format!("\x1b[0m{}", BG);
        let input = format!("{}\x1b[0m", reset_with_bg);
        assert_eq!(
            sanitizer().sanitize(&input),
            format!("{}{}", reset_with_bg, reset_with_bg)
        );
    }

    #[test]
    fn test_background_reset_is_restored() {
        assert_eq!(
            sanitizer().sanitize("A\x1b[49mB"),
            format!("A\x1b[49m{}B", BG)
        );
        assert_eq!(
            sanitizer().sanitize("A\x1b[39;49mB"),
            format!("A\x1b[39;49m{}B", BG)
        );
    }

    #[test]
    fn test_explicit_colors_untouched() {
        let input = "A\x1b[31mB\x1b[48;5;234mC\x1b[1;32mD";
        assert_eq!(sanitizer().sanitize(input), input);
    }

    #[test]
    fn test_idempotent() {
        let s = sanitizer();
        for input in [
            "plain",
            "\x1b[0m\x1b[0m",
            "a\x1b[1;31mb\x1b[0mc\x1b[49md\x1b[m",
            "\x1b[39;49m",
        ] {
            let once = s.sanitize(input);
            assert_eq!(s.sanitize(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_should_restore_background() {
        for params in ["", "0", "49", "39;49", "0;49"] {
            assert!(should_restore_background(params), "{:?}", params);
        }
        for params in ["39", "48;5;234", "1", "149"] {
            assert!(!should_restore_background(params), "{:?}", params);
        }
    }

    #[test]
    fn test_hex_to_ansi_background() {
        assert_eq!(hex_to_ansi_background("#1a1a2e").as_deref(), Some(BG));
        assert_eq!(hex_to_ansi_background("1a1a2e").as_deref(), Some(BG));
        assert_eq!(hex_to_ansi_background("#FFF"), None);
        assert_eq!(hex_to_ansi_background("#GGGGGG"), None);
        assert_eq!(hex_to_ansi_background(""), None);
    }

    #[test]
    fn test_wrapper_function() {
        let out = sanitize_modal_background("x\x1b[0m", BG).expect("sanitize");
        assert_eq!(out, format!("x\x1b[0m{}", BG));
    }
}
