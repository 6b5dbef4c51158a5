//! # Palettes
//!
//! Colors used by the widgets and by the execution bridges, grouped by
//! semantic role.
//!
//! A [`Palette`] is plain colors. A [`ModalPalette`] adds what the overlay
//! renderer needs on top of that: the 24-bit background escape of the modal
//! and a [`BackgroundSanitizer`] for it. Both are built once at session
//! start and passed by reference; nothing here is global.

use anyhow::{Context, Result};
use ratatui::style::Color;

use crate::ansi::{hex_to_ansi_background, parse_hex_rgb, BackgroundSanitizer};
use crate::config::Settings;

/// Widget colors, grouped by semantic role.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    /// Background behind every widget cell. `Color::Reset` when standalone.
    pub bg: Color,
    /// Primary text.
    pub fg: Color,
    /// Muted text: hints, descriptions, unselected items.
    pub fg_dim: Color,
    /// Titles, cursor, focused borders.
    pub accent: Color,
    /// Highlighted item text and the selection marker.
    pub highlight: Color,
    /// Command names and secondary labels.
    pub secondary: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    /// Separator rules.
    pub rule: Color,
}

impl Palette {
    /// Colors for widgets that own the whole terminal.
    pub fn standalone() -> Self {
        Self {
            bg: Color::Reset,
            fg: Color::Reset,
            fg_dim: rgb(0x6B, 0x72, 0x80),
            accent: rgb(0x7C, 0x3A, 0xED),
            highlight: rgb(0xA7, 0x8B, 0xFA),
            secondary: rgb(0x3B, 0x82, 0xF6),
            success: rgb(0x10, 0xB9, 0x81),
            error: rgb(0xEF, 0x44, 0x44),
            warning: rgb(0xF5, 0x9E, 0x0B),
            rule: rgb(0x37, 0x41, 0x51),
        }
    }

    /// Colors for widgets drawn inside a modal with background `bg`.
    pub fn modal(bg: Color, accent: Color) -> Self {
        Self {
            bg,
            fg: rgb(0xFF, 0xFF, 0xFF),
            accent,
            ..Self::standalone()
        }
    }

    /// Text color for labels drawn on an accent fill.
    pub fn on_accent(&self) -> Color {
        match self.bg {
            Color::Reset => Color::Black,
            bg => bg,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::standalone()
    }
}

/// Everything the overlay renderer and modal widgets need to agree on.
#[derive(Debug, Clone)]
pub struct ModalPalette {
    /// Colors handed to for-modal widget constructors.
    pub colors: Palette,
    /// Color of the rounded modal border.
    pub border: Color,
    background_escape: String,
    sanitizer: BackgroundSanitizer,
}

impl ModalPalette {
    /// Build from `#rrggbb` colors.
    pub fn new(background: &str, border: &str, accent: &str) -> Result<Self> {
        let bg = hex_color(background)
            .with_context(|| format!("Invalid modal background color: {}", background))?;
        let border = hex_color(border)
            .with_context(|| format!("Invalid modal border color: {}", border))?;
        let accent =
            hex_color(accent).with_context(|| format!("Invalid accent color: {}", accent))?;
        let background_escape = hex_to_ansi_background(background)
            .with_context(|| format!("Invalid modal background color: {}", background))?;
        let sanitizer = BackgroundSanitizer::new(background_escape.clone())?;

        Ok(Self {
            colors: Palette::modal(bg, accent),
            border,
            background_escape,
            sanitizer,
        })
    }

    /// Build from persisted settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.modal_background,
            &settings.modal_border,
            &settings.accent,
        )
    }

    /// The 24-bit SGR escape that selects the modal background.
    pub fn background_escape(&self) -> &str {
        &self.background_escape
    }

    pub fn sanitizer(&self) -> &BackgroundSanitizer {
        &self.sanitizer
    }
}

fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb(r, g, b)
}

/// Parse `#rrggbb` into a ratatui color.
pub fn hex_color(hex: &str) -> Option<Color> {
    parse_hex_rgb(hex).map(|(r, g, b)| Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_build_palette() {
        let palette = ModalPalette::from_settings(&Settings::default()).expect("palette");
        assert_eq!(palette.background_escape(), "\x1b[48;2;26;26;46m");
        assert_eq!(palette.colors.bg, Color::Rgb(0x1a, 0x1a, 0x2e));
        assert_eq!(palette.border, Color::Rgb(0x7C, 0x3A, 0xED));
    }

    #[test]
    fn test_invalid_color_is_rejected() {
        let err = ModalPalette::new("#xyz", "#7C3AED", "#7C3AED").expect_err("should fail");
        assert!(err.to_string().contains("#xyz"));
    }

    #[test]
    fn test_standalone_has_no_background() {
        assert_eq!(Palette::standalone().bg, Color::Reset);
    }
}
