//! # Modal Overlay Renderer
//!
//! Places a rendered widget as a framed, centered block on top of a full
//! screen of base text, without disturbing the base text's ANSI state.
//!
//! ```text
//!   base line  ->  [prefix .. startX) RESET+BG [overlay line] RESET [suffix ..) RESET
//! ```
//!
//! [`render_overlay`] applies the frame (rounded border, padding, background),
//! runs the result through the background sanitizer and composites it with
//! [`composite`]. Every output line ends in a plain reset and is exactly
//! `screen_width` visible characters wide.

use ratatui::style::Style;

use crate::ansi::{fit_to_width, suffix_after_width, truncate_to_width, visible_width, RESET};
use crate::component::ComponentKind;
use crate::ui::palette::ModalPalette;
use crate::ui::render::paint;

/// Horizontal padding inside the border, per side.
pub const PADDING_X: usize = 2;
/// Vertical padding inside the border, per side.
pub const PADDING_Y: usize = 1;
/// Columns taken by the frame: border (2) and padding (4).
pub const OVERHEAD_WIDTH: u16 = 2 + 2 * PADDING_X as u16;
/// Rows taken by the frame: border (2) and padding (2).
pub const OVERHEAD_HEIGHT: u16 = 2 + 2 * PADDING_Y as u16;

const MARGIN_X: u16 = 4;
const MARGIN_Y: u16 = 4;
const MIN_CONTENT_WIDTH: u16 = 20;
const MIN_CONTENT_HEIGHT: u16 = 3;
const MAX_CONTENT_WIDTH: u16 = 70;
const WIDE_CONTENT_WIDTH: u16 = 90;

/// Content area available to a widget inside the modal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModalSize {
    pub width: u16,
    pub height: u16,
}

/// Content size for a widget of `kind` on a `screen_width` x `screen_height`
/// terminal. The returned size excludes the frame, so the framed block plus
/// a small margin fits on screen (down to a floor of 20x3).
pub fn calculate_modal_size(kind: ComponentKind, screen_width: u16, screen_height: u16) -> ModalSize {
    let avail_width = screen_width
        .saturating_sub(MARGIN_X)
        .saturating_sub(OVERHEAD_WIDTH)
        .max(MIN_CONTENT_WIDTH);
    let avail_height = screen_height
        .saturating_sub(MARGIN_Y)
        .saturating_sub(OVERHEAD_HEIGHT)
        .max(MIN_CONTENT_HEIGHT);

    let (max_width, max_height) = match kind {
        ComponentKind::Input | ComponentKind::Confirm => (MAX_CONTENT_WIDTH, Some(4)),
        ComponentKind::Choose | ComponentKind::Filter => (MAX_CONTENT_WIDTH, Some(12)),
        ComponentKind::File => (MAX_CONTENT_WIDTH, Some(16)),
        ComponentKind::Table => (WIDE_CONTENT_WIDTH, Some(16)),
        ComponentKind::Pager => (WIDE_CONTENT_WIDTH, None),
        ComponentKind::Write => (MAX_CONTENT_WIDTH, Some(8)),
        ComponentKind::Spin => (50, Some(2)),
    };

    ModalSize {
        width: avail_width.min(max_width),
        height: max_height.map_or(avail_height, |h| avail_height.min(h)),
    }
}

/// Top-left corner of a block centered on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Center a `width` x `height` block, clamping at the top-left corner.
pub fn placement(width: usize, height: usize, screen_width: usize, screen_height: usize) -> Placement {
    Placement {
        x: screen_width.saturating_sub(width) / 2,
        y: screen_height.saturating_sub(height) / 2,
        width,
        height,
    }
}

/// Frame `content` with the modal border, padding and background.
pub fn apply_frame(content: &str, palette: &ModalPalette) -> String {
    let bg = palette.background_escape();
    let border_style = Style::default().fg(palette.border);
    let lines: Vec<&str> = content.split('\n').collect();
    let inner = lines.iter().map(|l| visible_width(l)).max().unwrap_or(0);
    let span = inner + 2 * PADDING_X;

    let edge = paint("│", border_style);
    let blank = format!("{}{}{}{}{}", edge, bg, " ".repeat(span), RESET, edge);
    let pad = " ".repeat(PADDING_X);

    let mut out = Vec::with_capacity(lines.len() + 2 + 2 * PADDING_Y);
    out.push(paint(&format!("╭{}╮", "─".repeat(span)), border_style));
    out.extend(std::iter::repeat_n(blank.clone(), PADDING_Y));
    for line in &lines {
        let fill = inner - visible_width(line);
        out.push(format!(
            "{edge}{bg}{pad}{line}{bg}{fill}{pad}{RESET}{edge}",
            fill = " ".repeat(fill)
        ));
    }
    out.extend(std::iter::repeat_n(blank, PADDING_Y));
    out.push(paint(&format!("╰{}╯", "─".repeat(span)), border_style));

    out.join("\n")
}

/// Frame `overlay`, sanitize it and composite it centered on `base`.
pub fn render_overlay(
    base: &str,
    overlay: &str,
    screen_width: usize,
    screen_height: usize,
    palette: &ModalPalette,
) -> String {
    let framed = apply_frame(overlay, palette);
    let styled = palette.sanitizer().sanitize(&framed);
    composite(
        base,
        &styled,
        screen_width,
        screen_height,
        palette.background_escape(),
    )
}

/// Composite an already styled `overlay` block centered on `base`.
///
/// `base` is padded with empty lines up to `screen_height`. `background` is
/// emitted right before each overlay line.
pub fn composite(
    base: &str,
    overlay: &str,
    screen_width: usize,
    screen_height: usize,
    background: &str,
) -> String {
    let mut base_lines: Vec<&str> = base.split('\n').collect();
    if base.is_empty() {
        base_lines.clear();
    }
    if base_lines.len() < screen_height {
        base_lines.resize(screen_height, "");
    }

    let overlay_lines: Vec<&str> = overlay.split('\n').collect();
    let overlay_width = overlay_lines
        .iter()
        .map(|l| visible_width(l))
        .max()
        .unwrap_or(0);
    let at = placement(overlay_width, overlay_lines.len(), screen_width, screen_height);

    base_lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            match i.checked_sub(at.y).and_then(|idx| overlay_lines.get(idx)) {
                Some(overlay_line) => {
                    composite_line(line, overlay_line, at, screen_width, background)
                }
                None => fit_to_width(line, screen_width),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn composite_line(
    base_line: &str,
    overlay_line: &str,
    at: Placement,
    screen_width: usize,
    background: &str,
) -> String {
    let base_width = visible_width(base_line);
    let mut out = String::with_capacity(base_line.len() + overlay_line.len() + 32);

    if at.x > 0 {
        if base_width >= at.x {
            out.push_str(&truncate_to_width(base_line, at.x));
        } else {
            out.push_str(base_line);
            out.push_str(RESET);
            out.push_str(&" ".repeat(at.x - base_width));
        }
    }

    out.push_str(RESET);
    out.push_str(background);

    let room = screen_width.saturating_sub(at.x);
    let shown = at.width.min(room);
    let line_width = visible_width(overlay_line);
    if line_width > shown {
        out.push_str(&truncate_to_width(overlay_line, shown));
    } else {
        out.push_str(overlay_line);
        out.push_str(&" ".repeat(shown - line_width));
    }
    out.push_str(RESET);

    let end = at.x + at.width;
    if end < screen_width {
        let tail = screen_width - end;
        if base_width > end {
            let suffix = suffix_after_width(base_line, end);
            out.push_str(&truncate_to_width(&suffix, tail));
            let used = visible_width(&suffix).min(tail);
            if used < tail {
                out.push_str(RESET);
                out.push_str(&" ".repeat(tail - used));
            }
        } else {
            out.push_str(&" ".repeat(tail));
        }
    }

    out.push_str(RESET);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::strip;

    const BG: &str = "\x1b[48;2;26;26;46m";

    fn palette() -> ModalPalette {
        ModalPalette::new("#1a1a2e", "#7C3AED", "#7C3AED").expect("palette")
    }

    #[test]
    fn test_centering_on_80x24() {
        let overlay = ["0123456789"; 3].join("\n");
        let at = placement(10, 3, 80, 24);
        assert_eq!((at.x, at.y), (35, 10));

        let out = composite("", &overlay, 80, 24, BG);
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines.len(), 24);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(visible_width(line), 80, "line {}", i);
            assert!(line.ends_with(RESET), "line {}", i);
        }
        assert_eq!(strip(lines[10]).find('0'), Some(35));
        assert!(!strip(lines[9]).contains('0'));
        assert!(!strip(lines[13]).contains('0'));
    }

    #[test]
    fn test_composite_line_exact_bytes() {
        let out = composite("abcdefgh", "XY", 8, 1, BG);
        assert_eq!(out, format!("abc\x1b[0m{}XY\x1b[0mfgh\x1b[0m", BG));
    }

    #[test]
    fn test_short_base_line_is_padded() {
        let out = composite("ab", "XY", 8, 1, BG);
        assert_eq!(out, format!("ab\x1b[0m \x1b[0m{}XY\x1b[0m   \x1b[0m", BG));
        assert_eq!(visible_width(&out), 8);
    }

    #[test]
    fn test_styled_base_suffix_keeps_style() {
        let base = "\x1b[31mredredred\x1b[0m";
        let out = composite(base, "X", 9, 1, BG);
        assert_eq!(
            out,
            format!("\x1b[31mredr\x1b[0m{}X\x1b[0m\x1b[31mdred\x1b[0m", BG)
        );
        assert_eq!(strip(&out), "redrXdred");
    }

    #[test]
    fn test_overlay_wider_than_screen_is_clipped() {
        let out = composite("", "0123456789", 4, 1, BG);
        assert_eq!(visible_width(&out), 4);
    }

    #[test]
    fn test_frame_dimensions() {
        let framed = apply_frame("hello\nhi", &palette());
        let lines: Vec<&str> = framed.split('\n').collect();
        assert_eq!(lines.len(), 2 + OVERHEAD_HEIGHT as usize);
        for line in &lines {
            assert_eq!(visible_width(line), 5 + OVERHEAD_WIDTH as usize);
        }
        assert!(strip(lines[0]).starts_with('╭'));
        assert_eq!(strip(lines[2]), "│  hello  │");
        assert_eq!(strip(lines[3]), "│  hi     │");
    }

    #[test]
    fn test_render_overlay_restores_background_after_widget_reset() {
        let out = render_overlay("", "a\x1b[0mb", 30, 9, &palette());
        assert!(out.contains(&format!("a\x1b[0m{}b", BG)));
        for line in out.split('\n') {
            assert_eq!(visible_width(line), 30);
        }
    }

    #[test]
    fn test_modal_sizes() {
        let size = calculate_modal_size(ComponentKind::Input, 120, 40);
        assert_eq!(size, ModalSize { width: 70, height: 4 });

        let size = calculate_modal_size(ComponentKind::Table, 120, 40);
        assert_eq!(size, ModalSize { width: 90, height: 16 });

        let size = calculate_modal_size(ComponentKind::Pager, 80, 24);
        assert_eq!(size, ModalSize { width: 70, height: 16 });

        let size = calculate_modal_size(ComponentKind::Spin, 120, 40);
        assert_eq!(size, ModalSize { width: 50, height: 2 });
    }

    #[test]
    fn test_modal_size_floor_on_tiny_screen() {
        let size = calculate_modal_size(ComponentKind::Choose, 10, 5);
        assert_eq!(size, ModalSize { width: 20, height: 3 });
    }
}
