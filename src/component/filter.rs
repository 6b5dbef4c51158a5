//! Type-to-filter list.
//!
//! Printable keys edit the query; `Up`/`Down` (or `Ctrl+P`/`Ctrl+N`) move the
//! cursor over the surviving items; in multi mode `Tab` toggles the item
//! under the cursor. `Enter` returns the toggled items in toggle order, or
//! the item under the cursor when nothing is toggled. With `strict` turned
//! off, `Enter` on an empty result returns the query itself.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde::Deserialize;

use super::choose::Selection;
use super::fuzzy::{rank, Ranked};
use super::input::LineBuffer;
use super::{
    header_lines, hint_line, is_cancel_key, key_press, render_lines, Command, Completion,
    Component, ComponentValue, Msg,
};
use crate::error::TuiError;
use crate::ui::palette::{ModalPalette, Palette};

const DEFAULT_PROMPT: &str = "> ";
const DEFAULT_PLACEHOLDER: &str = "Filter...";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    /// Maximum number of toggled items; above 1 enables multi mode.
    pub limit: usize,
    pub no_limit: bool,
    /// Indices toggled on at start (multi mode only).
    pub selected: Vec<usize>,
    pub placeholder: String,
    pub prompt: String,
    /// Initial query.
    pub value: String,
    pub width: u16,
    /// Visible rows for the list, 0 to fill the available height.
    pub height: u16,
    /// Draw the list bottom-up with the query line last.
    pub reverse: bool,
    /// Subsequence matching; plain substring matching when false.
    pub fuzzy: bool,
    /// Order matches by score instead of list order.
    pub sort: bool,
    /// Only items from the list can be returned.
    pub strict: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            options: Vec::new(),
            limit: 0,
            no_limit: false,
            selected: Vec::new(),
            placeholder: String::new(),
            prompt: String::new(),
            value: String::new(),
            width: 0,
            height: 0,
            reverse: false,
            fuzzy: true,
            sort: true,
            strict: true,
        }
    }
}

#[derive(Debug)]
pub struct FilterModel {
    options: FilterOptions,
    query: LineBuffer,
    matches: Vec<Ranked>,
    /// Position in `matches`.
    cursor: usize,
    offset: usize,
    selection: Selection,
    palette: Palette,
    state: Completion,
    width: u16,
    height: u16,
}

impl FilterModel {
    pub fn new(options: FilterOptions) -> Self {
        Self::with_palette(options, Palette::standalone())
    }

    pub fn for_modal(options: FilterOptions, palette: &ModalPalette) -> Self {
        Self::with_palette(options, palette.colors.clone())
    }

    fn with_palette(options: FilterOptions, palette: Palette) -> Self {
        let mut model = Self {
            query: LineBuffer::new(&options.value, 0),
            matches: Vec::new(),
            cursor: 0,
            offset: 0,
            selection: Selection::default(),
            palette,
            state: Completion::default(),
            width: 80,
            height: 12,
            options,
        };
        if model.options.options.is_empty() {
            model.state.submit();
            return model;
        }
        if model.is_multi() {
            let limit = model.limit();
            let count = model.options.options.len();
            for &index in model.options.selected.iter().filter(|&&i| i < count) {
                if !model.selection.contains(index) {
                    model.selection.toggle(index, limit);
                }
            }
        }
        model.refilter();
        model
    }

    pub fn is_multi(&self) -> bool {
        self.options.no_limit || self.options.limit > 1
    }

    fn limit(&self) -> usize {
        if self.options.no_limit {
            0
        } else {
            self.options.limit
        }
    }

    /// Items matching the current query, in display order.
    pub fn visible_items(&self) -> Vec<&str> {
        self.matches
            .iter()
            .filter_map(|m| self.options.options.get(m.index).map(String::as_str))
            .collect()
    }

    fn refilter(&mut self) {
        self.matches = rank(
            &self.options.options,
            &self.query.value(),
            self.options.fuzzy,
            self.options.sort,
        );
        self.cursor = 0;
        self.offset = 0;
    }

    fn header(&self) -> Vec<Line<'static>> {
        header_lines(&self.options.title, &self.options.description, &self.palette)
    }

    /// Rows available for items: everything minus header, query and hint.
    fn list_height(&self) -> usize {
        let chrome = self.header().len() + 2;
        let avail = (self.height as usize).saturating_sub(chrome).max(1);
        match self.options.height {
            0 => avail,
            h => avail.min(h as usize),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.matches.is_empty() {
            return;
        }
        let last = self.matches.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
        let rows = self.list_height();
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + rows {
            self.offset = self.cursor + 1 - rows;
        }
    }

    fn selected_items(&self) -> Vec<String> {
        let items = &self.options.options;
        if !self.selection.is_empty() {
            return self
                .selection
                .in_toggle_order()
                .iter()
                .filter_map(|&i| items.get(i).cloned())
                .collect();
        }
        if let Some(m) = self.matches.get(self.cursor) {
            return items.get(m.index).cloned().into_iter().collect();
        }
        let query = self.query.value();
        if !self.options.strict && !query.is_empty() {
            return vec![query];
        }
        Vec::new()
    }

    fn item_line(&self, ranked: &Ranked, focused: bool) -> Line<'static> {
        let p = &self.palette;
        let text = self
            .options
            .options
            .get(ranked.index)
            .map(String::as_str)
            .unwrap_or_default();

        let mut spans = Vec::new();
        spans.push(if focused {
            Span::styled("│ ", Style::default().fg(p.accent))
        } else {
            Span::raw("  ")
        });
        if self.is_multi() {
            spans.push(if self.selection.contains(ranked.index) {
                Span::styled("● ", Style::default().fg(p.highlight))
            } else {
                Span::styled("○ ", Style::default().fg(p.fg_dim))
            });
        }

        let base = if focused {
            Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(p.fg)
        };
        let hit = Style::default().fg(p.highlight).add_modifier(Modifier::BOLD);
        for (i, c) in text.chars().enumerate() {
            let style = if ranked.positions.binary_search(&i).is_ok() {
                hit
            } else {
                base
            };
            spans.push(Span::styled(c.to_string(), style));
        }
        Line::from(spans)
    }

    fn query_line(&self) -> Line<'static> {
        let p = &self.palette;
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
        if self.query.is_empty() {
            let placeholder = if self.options.placeholder.is_empty() {
                DEFAULT_PLACEHOLDER
            } else {
                self.options.placeholder.as_str()
            };
            let shown: String = placeholder.chars().take(room).collect();
            spans.push(Span::styled(shown, Style::default().fg(p.fg_dim)));
        } else {
            spans.extend(self.query.spans(room, false, Style::default().fg(p.fg)));
        }
        Line::from(spans)
    }
}

impl Component for FilterModel {
    fn update(&mut self, msg: Msg) -> Option<Command> {
        let key = key_press(&msg)?;
        if self.state.is_done() {
            return None;
        }
        if is_cancel_key(key) {
            self.state.cancel();
            return None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let (up, down) = if self.options.reverse { (1, -1) } else { (-1, 1) };
        match key.code {
            KeyCode::Up => self.move_cursor(up),
            KeyCode::Down => self.move_cursor(down),
            KeyCode::Char('p') | KeyCode::Char('k') if ctrl => self.move_cursor(up),
            KeyCode::Char('n') | KeyCode::Char('j') if ctrl => self.move_cursor(down),
            KeyCode::PageUp => self.move_cursor(up * self.list_height() as isize),
            KeyCode::PageDown => self.move_cursor(down * self.list_height() as isize),
            KeyCode::Tab if self.is_multi() => {
                if let Some(index) = self.matches.get(self.cursor).map(|m| m.index) {
                    self.selection.toggle(index, self.limit());
                    self.move_cursor(down);
                }
            }
            KeyCode::Enter => self.state.submit(),
            _ => {
                let before = self.query.value();
                self.query.handle_key(key);
                if self.query.value() != before {
                    self.refilter();
                }
            }
        }
        None
    }

    fn view(&self) -> String {
        if self.state.is_done() {
            return String::new();
        }
        let p = &self.palette;
        let mut items: Vec<Line<'static>> = self
            .matches
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(self.list_height())
            .map(|(i, m)| self.item_line(m, i == self.cursor))
            .collect();
        if items.is_empty() {
            items.push(hint_line("  No matches", p));
        }

        let hint = if self.is_multi() {
            format!(
                "tab toggle • enter submit • {} selected",
                self.selection.len()
            )
        } else {
            format!("{}/{} • enter select", self.matches.len(), self.options.options.len())
        };

        let mut lines = self.header();
        if self.options.reverse {
            items.reverse();
            lines.extend(items);
            lines.push(self.query_line());
        } else {
            lines.push(self.query_line());
            lines.extend(items);
        }
        lines.push(hint_line(&hint, p));
        render_lines(lines, self.width, p)
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    fn result(&self) -> Result<ComponentValue, TuiError> {
        self.state.result(|| ComponentValue::List(self.selected_items()))
    }

    fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.move_cursor(0);
    }
}
