//! Scrollable read-only text.
//!
//! `q` and `Enter` close the pager; `Esc` and `Ctrl+C` cancel it. Content
//! may carry its own ANSI styling, which is passed through.

use crossterm::event::KeyCode;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde::Deserialize;

use super::{
    hint_line, is_cancel_key, key_press, render_lines, Command, Completion, Component,
    ComponentValue, Msg,
};
use crate::ansi::{fit_to_width, suffix_after_width, truncate_to_width, visible_width};
use crate::error::TuiError;
use crate::ui::palette::{ModalPalette, Palette};
use crate::ui::render::paint;
use crate::ui::viewport::Viewport;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PagerOptions {
    pub title: String,
    pub content: String,
    #[serde(alias = "show_line_num")]
    pub show_line_numbers: bool,
    /// Wrap long lines instead of cutting them at the right edge.
    pub soft_wrap: bool,
}

/// Split `line` into pieces of at most `width` visible columns.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let total = visible_width(line);
    if width == 0 || total <= width {
        return vec![line.to_string()];
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < total {
        let rest = suffix_after_width(line, start);
        pieces.push(truncate_to_width(&rest, width));
        start += width;
    }
    pieces
}

#[derive(Debug)]
pub struct PagerModel {
    options: PagerOptions,
    viewport: Viewport,
    palette: Palette,
    state: Completion,
    width: u16,
    height: u16,
}

impl PagerModel {
    pub fn new(options: PagerOptions) -> Self {
        Self::with_palette(options, Palette::standalone())
    }

    pub fn for_modal(options: PagerOptions, palette: &ModalPalette) -> Self {
        Self::with_palette(options, palette.colors.clone())
    }

    fn with_palette(options: PagerOptions, palette: Palette) -> Self {
        let mut model = Self {
            options,
            viewport: Viewport::default(),
            palette,
            state: Completion::default(),
            width: 80,
            height: 20,
        };
        model.layout();
        model
    }

    fn chrome(&self) -> u16 {
        let title = u16::from(!self.options.title.is_empty());
        title + 1
    }

    fn gutter_width(&self) -> usize {
        if self.options.show_line_numbers {
            let count = self.options.content.lines().count().max(1);
            count.to_string().len() + 3
        } else {
            0
        }
    }

    /// Rebuild the display rows for the current size.
    fn layout(&mut self) {
        let gutter = self.gutter_width();
        let text_width = (self.width as usize).saturating_sub(gutter);
        let number_width = gutter.saturating_sub(3);
        let dim = Style::default().fg(self.palette.fg_dim);

        let mut rows = Vec::new();
        for (i, line) in self.options.content.lines().enumerate() {
            let pieces = if self.options.soft_wrap {
                wrap_line(line, text_width)
            } else {
                vec![line.to_string()]
            };
            for (j, piece) in pieces.into_iter().enumerate() {
                if gutter == 0 {
                    rows.push(piece);
                    continue;
                }
                let number = if j == 0 {
                    format!("{:>w$} │ ", i + 1, w = number_width)
                } else {
                    format!("{:>w$} │ ", "", w = number_width)
                };
                rows.push(format!("{}{}", paint(&number, dim), piece));
            }
        }
        let height = self.height.saturating_sub(self.chrome()).max(1);
        self.viewport.set_size(self.width, height);
        self.viewport.set_content(&rows.join("\n"));
    }

    pub fn scroll_offset(&self) -> usize {
        self.viewport.offset()
    }
}

impl Component for PagerModel {
    fn update(&mut self, msg: Msg) -> Option<Command> {
        let key = key_press(&msg)?;
        if self.state.is_done() {
            return None;
        }
        if is_cancel_key(key) {
            self.state.cancel();
            return None;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Enter => self.state.submit(),
            KeyCode::Up | KeyCode::Char('k') => self.viewport.line_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.viewport.line_down(1),
            KeyCode::PageUp | KeyCode::Char('b') => self.viewport.page_up(),
            KeyCode::PageDown | KeyCode::Char('f') | KeyCode::Char(' ') => {
                self.viewport.page_down();
            }
            KeyCode::Char('u') => self.viewport.half_page_up(),
            KeyCode::Char('d') => self.viewport.half_page_down(),
            KeyCode::Home | KeyCode::Char('g') => self.viewport.goto_top(),
            KeyCode::End | KeyCode::Char('G') => self.viewport.goto_bottom(),
            _ => {}
        }
        None
    }

    fn view(&self) -> String {
        if self.state.is_done() {
            return String::new();
        }
        let p = &self.palette;
        let width = self.width as usize;
        let mut out = Vec::new();

        if !self.options.title.is_empty() {
            out.push(render_lines(
                vec![Line::from(Span::styled(
                    self.options.title.clone(),
                    Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
                ))],
                self.width,
                p,
            ));
        }
        for line in self.viewport.visible_lines() {
            out.push(fit_to_width(line, width));
        }
        let footer = format!(
            "↑/↓ scroll • q/enter close • {:3.0}%",
            self.viewport.scroll_percent() * 100.0
        );
        out.push(render_lines(vec![hint_line(&footer, p)], self.width, p));
        out.join("\n")
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    fn result(&self) -> Result<ComponentValue, TuiError> {
        self.state.result(|| ComponentValue::None)
    }

    fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.layout();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::strip;
    use crate::component::test_support::*;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_q_and_enter_close_without_cancel() {
        for code in [KeyCode::Char('q'), KeyCode::Enter] {
            let mut model = PagerModel::new(PagerOptions::default());
            model.update(key(code));
            assert!(model.is_done());
            assert!(!model.is_cancelled());
            assert_eq!(model.result().ok(), Some(ComponentValue::None));
        }
    }

    #[test]
    fn test_scrolling() {
        let mut model = PagerModel::new(PagerOptions {
            content: numbered(50),
            ..PagerOptions::default()
        });
        model.set_size(40, 11);
        model.update(key(KeyCode::Down));
        assert_eq!(model.scroll_offset(), 1);
        model.update(key(KeyCode::End));
        assert_eq!(model.scroll_offset(), 40);
        let view = strip(&model.view());
        assert!(view.contains("line 50"));
        assert!(view.contains("100%"));
        model.update(key(KeyCode::Home));
        assert_eq!(model.scroll_offset(), 0);
    }

    #[test]
    fn test_view_has_fixed_size() {
        let mut model = PagerModel::new(PagerOptions {
            title: "Log".into(),
            content: "short\nlines".into(),
            ..PagerOptions::default()
        });
        model.set_size(20, 6);
        let view = strip(&model.view());
        let lines: Vec<&str> = view.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|l| l.chars().count() == 20));
        assert!(lines[0].starts_with("Log"));
        assert!(lines[1].starts_with("short"));
    }

    #[test]
    fn test_line_numbers() {
        let mut model = PagerModel::new(PagerOptions {
            content: numbered(12),
            show_line_numbers: true,
            ..PagerOptions::default()
        });
        model.set_size(30, 20);
        let view = strip(&model.view());
        let lines: Vec<&str> = view.lines().collect();
        assert!(lines[0].starts_with(" 1 │ line 1"));
        assert!(lines[11].starts_with("12 │ line 12"));
    }

    #[test]
    fn test_soft_wrap() {
        assert_eq!(wrap_line("abcdefg", 3), vec!["abc", "def", "g"]);
        let mut model = PagerModel::new(PagerOptions {
            content: "abcdefghij".into(),
            soft_wrap: true,
            ..PagerOptions::default()
        });
        model.set_size(4, 6);
        let view = strip(&model.view());
        let lines: Vec<&str> = view.lines().collect();
        assert_eq!(&lines[..3], &["abcd", "efgh", "ij  "]);
    }

    #[test]
    fn test_styled_content_passes_through() {
        let mut model = PagerModel::new(PagerOptions {
            content: "\x1b[31mred\x1b[0m".into(),
            ..PagerOptions::default()
        });
        model.set_size(10, 3);
        assert!(model.view().contains("\x1b[31mred"));
    }
}
