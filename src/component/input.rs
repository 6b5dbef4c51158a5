//! Single-line text input.
//!
//! | Key | Action |
//! |-----|--------|
//! | printable | insert at cursor (up to `char_limit`) |
//! | `Backspace` / `Delete` | remove before / under cursor |
//! | `Left` / `Right`, `Home` / `End`, `Ctrl+A` / `Ctrl+E` | move |
//! | `Ctrl+U` | delete to start of line |
//! | `Enter` | submit |
//! | `Esc` / `Ctrl+C` | cancel |

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

const DEFAULT_PROMPT: &str = "> ";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputOptions {
    pub title: String,
    pub description: String,
    pub placeholder: String,
    /// Initial value.
    pub value: String,
    /// Maximum number of characters, 0 for none.
    pub char_limit: usize,
    /// Field width, 0 to use the available width.
    pub width: u16,
    /// Mask typed characters.
    pub password: bool,
    /// Text before the field, `"> "` when empty.
    pub prompt: String,
}

/// Editable line of text with a cursor, counted in `char`s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    chars: Vec<char>,
    cursor: usize,
    limit: usize,
}

impl LineBuffer {
    pub fn new(value: &str, limit: usize) -> Self {
        let mut chars: Vec<char> = value.chars().collect();
        if limit > 0 {
            chars.truncate(limit);
        }
        Self {
            cursor: chars.len(),
            chars,
            limit,
        }
    }

    pub fn value(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn insert(&mut self, c: char) {
        if self.limit > 0 && self.chars.len() >= self.limit {
            return;
        }
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.chars.len();
    }

    pub fn clear_to_start(&mut self) {
        self.chars.drain(..self.cursor);
        self.cursor = 0;
    }

    /// Apply an editing key. Returns false if the key is not an edit.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('a') if ctrl => self.home(),
            KeyCode::Char('e') if ctrl => self.end(),
            KeyCode::Char('u') if ctrl => self.clear_to_start(),
            KeyCode::Char(c) if !ctrl => self.insert(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.left(),
            KeyCode::Right => self.right(),
            KeyCode::Home => self.home(),
            KeyCode::End => self.end(),
            _ => return false,
        }
        true
    }

    /// Spans for the visible part of the field, `width` columns at most,
    /// with the cursor drawn reversed.
    pub fn spans(&self, width: usize, mask: bool, style: Style) -> Vec<Span<'static>> {
        let width = width.max(1);
        let start = (self.cursor + 1).saturating_sub(width);
        let shown = |c: char| if mask { '•' } else { c };

        let before: String = self.chars[start..self.cursor].iter().map(|&c| shown(c)).collect();
        let at: String = self
            .chars
            .get(self.cursor)
            .map_or(' ', |&c| shown(c))
            .to_string();
        let remaining = width.saturating_sub(self.cursor - start + 1);
        let after: String = self
            .chars
            .iter()
            .skip(self.cursor + 1)
            .take(remaining)
            .map(|&c| shown(c))
            .collect();

        vec![
            Span::styled(before, style),
            Span::styled(at, style.add_modifier(Modifier::REVERSED)),
            Span::styled(after, style),
        ]
    }
}

#[derive(Debug)]
pub struct InputModel {
    options: InputOptions,
    buffer: LineBuffer,
    palette: Palette,
    state: Completion,
    width: u16,
    height: u16,
}

impl InputModel {
    pub fn new(options: InputOptions) -> Self {
        Self::with_palette(options, Palette::standalone())
    }

    pub fn for_modal(options: InputOptions, palette: &ModalPalette) -> Self {
        Self::with_palette(options, palette.colors.clone())
    }

    fn with_palette(options: InputOptions, palette: Palette) -> Self {
        let buffer = LineBuffer::new(&options.value, options.char_limit);
        Self {
            options,
            buffer,
            palette,
            state: Completion::default(),
            width: 80,
            height: 4,
        }
    }

    pub fn value(&self) -> String {
        self.buffer.value()
    }
}

impl Component for InputModel {
    fn update(&mut self, msg: Msg) -> Option<Command> {
        let key = key_press(&msg)?;
        if self.state.is_done() {
            return None;
        }
        if is_cancel_key(key) {
            self.state.cancel();
        } else if key.code == KeyCode::Enter {
            self.state.submit();
        } else {
            self.buffer.handle_key(key);
        }
        None
    }

    fn view(&self) -> String {
        if self.state.is_done() {
            return String::new();
        }
        let p = &self.palette;
        let mut lines = header_lines(&self.options.title, &self.options.description, p);

        let prompt = if self.options.prompt.is_empty() {
            DEFAULT_PROMPT
        } else {
            self.options.prompt.as_str()
        };
        let field_width = if self.options.width > 0 {
            self.options.width.min(self.width)
        } else {
            self.width
        } as usize;
        let room = field_width.saturating_sub(prompt.chars().count() + 1);

        let mut spans = vec![Span::styled(prompt.to_string(), Style::default().fg(p.accent))];
        if self.buffer.is_empty() && !self.options.placeholder.is_empty() {
            let mut chars = self.options.placeholder.chars();
            let first: String = chars.next().map(String::from).unwrap_or_default();
            let rest: String = chars.take(room.saturating_sub(1)).collect();
            spans.push(Span::styled(
                first,
                Style::default().fg(p.fg_dim).add_modifier(Modifier::REVERSED),
            ));
            spans.push(Span::styled(rest, Style::default().fg(p.fg_dim)));
        } else {
            spans.extend(
                self.buffer
                    .spans(room, self.options.password, Style::default().fg(p.fg)),
            );
        }
        lines.push(Line::from(spans));

        if lines.len() < self.height as usize {
            lines.push(hint_line("enter submit • esc cancel", p));
        }
        render_lines(lines, self.width, p)
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    fn result(&self) -> Result<ComponentValue, TuiError> {
        self.state.result(|| ComponentValue::Text(self.buffer.value()))
    }

    fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }
}
