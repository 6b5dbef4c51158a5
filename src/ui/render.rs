//! # Buffer Serialization
//!
//! Widgets are drawn with ratatui into an off-screen [`Buffer`] and then
//! serialized to ANSI text, which is what the overlay compositor and the
//! execution bridges work with.
//!
//! Every serialized line ends with a reset, and a style change always starts
//! from a reset, so a line never depends on the style state left by another.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};

use crate::ansi::RESET;

/// Draw into a fresh `width` x `height` buffer and serialize it.
pub fn draw<F>(width: u16, height: u16, f: F) -> String
where
    F: FnOnce(Rect, &mut Buffer),
{
    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    f(area, &mut buf);
    buffer_to_ansi(&buf)
}

/// Serialize every row of `buf` as a line of ANSI text.
pub fn buffer_to_ansi(buf: &Buffer) -> String {
    let area = buf.area;
    let mut lines = Vec::with_capacity(area.height as usize);

    for y in area.top()..area.bottom() {
        let mut line = String::with_capacity(area.width as usize * 2);
        let mut current = CellStyle::default();

        for x in area.left()..area.right() {
            let Some(cell) = buf.cell((x, y)) else {
                continue;
            };
            let style = CellStyle {
                fg: cell.fg,
                bg: cell.bg,
                modifier: cell.modifier,
            };
            if style != current {
                line.push_str(RESET);
                line.push_str(&style.sgr());
                current = style;
            }
            line.push_str(cell.symbol());
        }

        line.push_str(RESET);
        lines.push(line);
    }

    lines.join("\n")
}

/// Wrap `text` in the escapes for `style`, followed by a reset.
pub fn paint(text: &str, style: Style) -> String {
    let sgr = CellStyle::from(style).sgr();
    if sgr.is_empty() {
        return text.to_string();
    }
    format!("{}{}{}", sgr, text, RESET)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellStyle {
    fg: Color,
    bg: Color,
    modifier: Modifier,
}

impl Default for CellStyle {
    fn default() -> Self {
        Self {
            fg: Color::Reset,
            bg: Color::Reset,
            modifier: Modifier::empty(),
        }
    }
}

impl From<Style> for CellStyle {
    fn from(style: Style) -> Self {
        Self {
            fg: style.fg.unwrap_or(Color::Reset),
            bg: style.bg.unwrap_or(Color::Reset),
            modifier: style.add_modifier.difference(style.sub_modifier),
        }
    }
}

impl CellStyle {
    /// SGR escape selecting this style from a reset state; empty when the
    /// style is the terminal default.
    fn sgr(&self) -> String {
        let mut params: Vec<String> = Vec::new();

        for (flag, code) in [
            (Modifier::BOLD, "1"),
            (Modifier::DIM, "2"),
            (Modifier::ITALIC, "3"),
            (Modifier::UNDERLINED, "4"),
            (Modifier::SLOW_BLINK, "5"),
            (Modifier::RAPID_BLINK, "6"),
            (Modifier::REVERSED, "7"),
            (Modifier::HIDDEN, "8"),
            (Modifier::CROSSED_OUT, "9"),
        ] {
            if self.modifier.contains(flag) {
                params.push(code.to_string());
            }
        }
        if let Some(fg) = color_params(self.fg, false) {
            params.push(fg);
        }
        if let Some(bg) = color_params(self.bg, true) {
            params.push(bg);
        }

        if params.is_empty() {
            String::new()
        } else {
            format!("\x1b[{}m", params.join(";"))
        }
    }
}

fn color_params(color: Color, background: bool) -> Option<String> {
    let base: u8 = if background { 10 } else { 0 };
    let code = match color {
        Color::Reset => return None,
        Color::Black => 30,
        Color::Red => 31,
        Color::Green => 32,
        Color::Yellow => 33,
        Color::Blue => 34,
        Color::Magenta => 35,
        Color::Cyan => 36,
        Color::Gray => 37,
        Color::DarkGray => 90,
        Color::LightRed => 91,
        Color::LightGreen => 92,
        Color::LightYellow => 93,
        Color::LightBlue => 94,
        Color::LightMagenta => 95,
        Color::LightCyan => 96,
        Color::White => 97,
        Color::Rgb(r, g, b) => {
            return Some(format!("{};2;{};{};{}", 38 + base, r, g, b));
        }
        Color::Indexed(i) => return Some(format!("{};5;{}", 38 + base, i)),
    };
    Some((code + base).to_string())
}
