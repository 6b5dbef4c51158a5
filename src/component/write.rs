//! Multi-line text editor.
//!
//! `Enter` starts a new line, `Ctrl+D` submits, `Esc`/`Ctrl+C` cancel.
//! Arrow keys, `Home`/`End` and `Ctrl+A`/`Ctrl+E` move the cursor.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde::Deserialize;

use super::{
    header_lines, hint_line, is_cancel_key, key_press, render_lines, Command, Completion,
    Component, ComponentValue, Msg,
};
use crate::error::TuiError;
use crate::ui::palette::{ModalPalette, Palette};

const DEFAULT_ROWS: u16 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub title: String,
    pub description: String,
    pub placeholder: String,
    pub value: String,
    /// Maximum characters including line breaks, 0 for none.
    pub char_limit: usize,
    pub width: u16,
    /// Editor rows, 5 when 0.
    pub height: u16,
    pub show_line_numbers: bool,
}

/// Text as lines of chars with a (row, col) cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TextArea {
    lines: Vec<Vec<char>>,
    row: usize,
    col: usize,
    limit: usize,
}

impl TextArea {
    fn new(value: &str, limit: usize) -> Self {
        let mut area = Self {
            lines: vec![Vec::new()],
            row: 0,
            col: 0,
            limit,
        };
        for c in value.chars() {
            if c == '\n' {
                area.newline();
            } else if c != '\r' {
                area.insert(c);
            }
        }
        area
    }

    fn value(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn len(&self) -> usize {
        self.lines.iter().map(Vec::len).sum::<usize>() + self.lines.len() - 1
    }

    fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    fn full(&self) -> bool {
        self.limit > 0 && self.len() >= self.limit
    }

    fn current(&mut self) -> &mut Vec<char> {
        &mut self.lines[self.row]
    }

    fn insert(&mut self, c: char) {
        if self.full() {
            return;
        }
        let col = self.col;
        self.current().insert(col, c);
        self.col += 1;
    }

    fn newline(&mut self) {
        if self.full() {
            return;
        }
        let col = self.col;
        let tail = self.current().split_off(col);
        self.row += 1;
        self.lines.insert(self.row, tail);
        self.col = 0;
    }

    fn backspace(&mut self) {
        if self.col > 0 {
            self.col -= 1;
            let col = self.col;
            self.current().remove(col);
        } else if self.row > 0 {
            let line = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.lines[self.row].len();
            self.current().extend(line);
        }
    }

    fn delete(&mut self) {
        if self.col < self.lines[self.row].len() {
            let col = self.col;
            self.current().remove(col);
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.current().extend(next);
        }
    }

    fn up(&mut self) {
        if self.row > 0 {
            self.row -= 1;
            self.col = self.col.min(self.lines[self.row].len());
        }
    }

    fn down(&mut self) {
        if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = self.col.min(self.lines[self.row].len());
        }
    }

    fn left(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = self.lines[self.row].len();
        }
    }

    fn right(&mut self) {
        if self.col < self.lines[self.row].len() {
            self.col += 1;
        } else if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('a') if ctrl => self.col = 0,
            KeyCode::Char('e') if ctrl => self.col = self.lines[self.row].len(),
            KeyCode::Char(c) if !ctrl => self.insert(c),
            KeyCode::Enter => self.newline(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Up => self.up(),
            KeyCode::Down => self.down(),
            KeyCode::Left => self.left(),
            KeyCode::Right => self.right(),
            KeyCode::Home => self.col = 0,
            KeyCode::End => self.col = self.lines[self.row].len(),
            _ => {}
        }
    }
}

#[derive(Debug)]
pub struct WriteModel {
    options: WriteOptions,
    text: TextArea,
    top: usize,
    palette: Palette,
    state: Completion,
    width: u16,
    height: u16,
}

impl WriteModel {
    pub fn new(options: WriteOptions) -> Self {
        Self::with_palette(options, Palette::standalone())
    }

    pub fn for_modal(options: WriteOptions, palette: &ModalPalette) -> Self {
        Self::with_palette(options, palette.colors.clone())
    }

    fn with_palette(options: WriteOptions, palette: Palette) -> Self {
        let text = TextArea::new(&options.value, options.char_limit);
        Self {
            options,
            text,
            top: 0,
            palette,
            state: Completion::default(),
            width: 80,
            height: 10,
        }
    }

    pub fn value(&self) -> String {
        self.text.value()
    }

    fn rows(&self) -> usize {
        let wanted = if self.options.height == 0 {
            DEFAULT_ROWS
        } else {
            self.options.height
        } as usize;
        let chrome =
            header_lines(&self.options.title, &self.options.description, &self.palette).len() + 1;
        wanted.min((self.height as usize).saturating_sub(chrome).max(1))
    }

    fn scroll_to_cursor(&mut self) {
        let rows = self.rows();
        if self.text.row < self.top {
            self.top = self.text.row;
        } else if self.text.row >= self.top + rows {
            self.top = self.text.row + 1 - rows;
        }
    }

    fn row_line(&self, index: usize, gutter: usize, field: usize) -> Line<'static> {
        let p = &self.palette;
        let mut spans = Vec::new();
        if gutter > 0 {
            let number = if index < self.text.lines.len() {
                format!("{:>w$} ", index + 1, w = gutter - 1)
            } else {
                " ".repeat(gutter)
            };
            spans.push(Span::styled(number, Style::default().fg(p.fg_dim)));
        }
        let Some(chars) = self.text.lines.get(index) else {
            return Line::from(spans);
        };
        let text_style = Style::default().fg(p.fg);
        if index != self.text.row {
            let shown: String = chars.iter().take(field).collect();
            spans.push(Span::styled(shown, text_style));
            return Line::from(spans);
        }
        let col = self.text.col;
        let start = (col + 1).saturating_sub(field.max(1));
        let before: String = chars[start..col].iter().collect();
        let at = chars.get(col).map_or(' ', |&c| c).to_string();
        let after: String = chars
            .iter()
            .skip(col + 1)
            .take(field.saturating_sub(col - start + 1))
            .collect();
        spans.push(Span::styled(before, text_style));
        spans.push(Span::styled(at, text_style.add_modifier(Modifier::REVERSED)));
        spans.push(Span::styled(after, text_style));
        Line::from(spans)
    }
}

impl Component for WriteModel {
    fn update(&mut self, msg: Msg) -> Option<Command> {
        let key = key_press(&msg)?;
        if self.state.is_done() {
            return None;
        }
        if is_cancel_key(key) {
            self.state.cancel();
            return None;
        }
        if key.code == KeyCode::Char('d') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.state.submit();
            return None;
        }
        self.text.handle_key(key);
        self.scroll_to_cursor();
        None
    }

    fn view(&self) -> String {
        if self.state.is_done() {
            return String::new();
        }
        let p = &self.palette;
        let mut lines = header_lines(&self.options.title, &self.options.description, p);

        let width = if self.options.width > 0 {
            self.options.width.min(self.width)
        } else {
            self.width
        } as usize;
        let gutter = if self.options.show_line_numbers {
            self.text.lines.len().to_string().len() + 2
        } else {
            0
        };
        let field = width.saturating_sub(gutter + 1);
        let rows = self.rows();

        if self.text.is_empty() && !self.options.placeholder.is_empty() {
            let placeholder: String = self.options.placeholder.chars().take(field).collect();
            let mut spans = Vec::new();
            if gutter > 0 {
                spans.push(Span::styled(
                    format!("{:>w$} ", 1, w = gutter - 1),
                    Style::default().fg(p.fg_dim),
                ));
            }
            spans.push(Span::styled(placeholder, Style::default().fg(p.fg_dim)));
            lines.push(Line::from(spans));
            lines.extend((1..rows).map(|i| self.row_line(i, gutter, field)));
        } else {
            lines.extend((self.top..self.top + rows).map(|i| self.row_line(i, gutter, field)));
        }

        lines.push(hint_line("ctrl+d submit • esc cancel", p));
        render_lines(lines, self.width, p)
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    fn result(&self) -> Result<ComponentValue, TuiError> {
        self.state.result(|| ComponentValue::Text(self.text.value()))
    }

    fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.scroll_to_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::strip;
    use crate::component::test_support::*;

    #[test]
    fn test_enter_inserts_newline_and_ctrl_d_submits() {
        let mut model = WriteModel::new(WriteOptions::default());
        feed(&mut model, chars("one"));
        model.update(key(KeyCode::Enter));
        feed(&mut model, chars("two"));
        assert!(!model.is_done());
        model.update(ctrl('d'));
        assert_eq!(
            model.result().ok(),
            Some(ComponentValue::Text("one\ntwo".into()))
        );
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut model = WriteModel::new(WriteOptions {
            value: "ab\ncd".into(),
            ..WriteOptions::default()
        });
        model.update(key(KeyCode::Home));
        model.update(key(KeyCode::Backspace));
        assert_eq!(model.value(), "abcd");
    }

    #[test]
    fn test_vertical_movement_clamps_column() {
        let mut model = WriteModel::new(WriteOptions {
            value: "long line\nx".into(),
            ..WriteOptions::default()
        });
        model.update(key(KeyCode::Up));
        model.update(key(KeyCode::End));
        model.update(key(KeyCode::Down));
        model.update(key(KeyCode::Char('!')));
        assert_eq!(model.value(), "long line\nx!");
    }

    #[test]
    fn test_char_limit_counts_newlines() {
        let mut model = WriteModel::new(WriteOptions {
            char_limit: 4,
            ..WriteOptions::default()
        });
        feed(&mut model, chars("ab"));
        model.update(key(KeyCode::Enter));
        feed(&mut model, chars("cdef"));
        assert_eq!(model.value(), "ab\nc");
    }

    #[test]
    fn test_view_scrolls_with_cursor() {
        let mut model = WriteModel::new(WriteOptions {
            value: (1..=20).map(|i| format!("row{}", i)).collect::<Vec<_>>().join("\n"),
            height: 3,
            ..WriteOptions::default()
        });
        model.set_size(20, 10);
        let view = strip(&model.view());
        assert!(view.contains("row20"));
        assert!(!view.contains("row1 "));
        assert_eq!(view.lines().count(), 4);
    }

    #[test]
    fn test_line_numbers_and_placeholder() {
        let mut model = WriteModel::new(WriteOptions {
            placeholder: "Say something".into(),
            show_line_numbers: true,
            ..WriteOptions::default()
        });
        model.set_size(30, 10);
        let view = strip(&model.view());
        assert!(view.lines().next().is_some_and(|l| l.starts_with(" 1 Say something")));
    }
}
