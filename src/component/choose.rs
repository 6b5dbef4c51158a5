//! Pick one or more items from a list.
//!
//! Single mode (`limit <= 1` and not `no_limit`): `Enter` returns the item
//! under the cursor.
//!
//! Multi mode: `Space`/`Tab`/`x` toggle the item under the cursor, `Ctrl+A`
//! toggles everything (when unlimited), `Enter` returns the toggled items in
//! the order they were toggled on. With `ordered` the result follows list
//! order instead. `Enter` with nothing toggled returns the item under the
//! cursor.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde::Deserialize;

use super::{
    header_lines, hint_line, is_cancel_key, key_press, render_lines, Command, Completion,
    Component, ComponentValue, Msg,
};
use crate::error::TuiError;
use crate::ui::palette::{ModalPalette, Palette};

const DEFAULT_CURSOR: &str = "> ";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChooseOptions {
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    /// Item the cursor starts on (and, in multi mode, starts toggled).
    pub selected: String,
    /// Maximum number of toggled items; above 1 enables multi mode.
    pub limit: usize,
    /// Multi mode without a limit.
    pub no_limit: bool,
    /// Return toggled items in list order rather than toggle order.
    pub ordered: bool,
    /// Visible rows for the list, 0 to fill the available height.
    pub height: u16,
    /// Marker in front of the item under the cursor.
    pub cursor: String,
}

/// Ordered set of toggled indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    order: Vec<usize>,
}

impl Selection {
    pub fn contains(&self, index: usize) -> bool {
        self.order.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Toggle `index`. Turning an item on fails silently once `limit`
    /// (0 = unlimited) items are on.
    pub fn toggle(&mut self, index: usize, limit: usize) {
        if let Some(pos) = self.order.iter().position(|&i| i == index) {
            self.order.remove(pos);
        } else if limit == 0 || self.order.len() < limit {
            self.order.push(index);
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Indices in the order they were toggled on.
    pub fn in_toggle_order(&self) -> &[usize] {
        &self.order
    }

    /// Indices in ascending order.
    pub fn in_list_order(&self) -> Vec<usize> {
        let mut sorted = self.order.clone();
        sorted.sort_unstable();
        sorted
    }
}

#[derive(Debug)]
pub struct ChooseModel {
    options: ChooseOptions,
    cursor: usize,
    offset: usize,
    selection: Selection,
    palette: Palette,
    state: Completion,
    width: u16,
    height: u16,
}

impl ChooseModel {
    pub fn new(options: ChooseOptions) -> Self {
        Self::with_palette(options, Palette::standalone())
    }

    pub fn for_modal(options: ChooseOptions, palette: &ModalPalette) -> Self {
        Self::with_palette(options, palette.colors.clone())
    }

    fn with_palette(options: ChooseOptions, palette: Palette) -> Self {
        let mut model = Self {
            cursor: 0,
            offset: 0,
            selection: Selection::default(),
            palette,
            state: Completion::default(),
            width: 80,
            height: 12,
            options,
        };
        if !model.options.selected.is_empty() {
            if let Some(index) = model
                .options
                .options
                .iter()
                .position(|o| *o == model.options.selected)
            {
                model.cursor = index;
                if model.is_multi() {
                    model.selection.toggle(index, model.limit());
                }
            }
        }
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

    fn header(&self) -> Vec<Line<'static>> {
        header_lines(&self.options.title, &self.options.description, &self.palette)
    }

    /// Rows available for items.
    fn list_height(&self) -> usize {
        let chrome = self.header().len() + 1;
        let avail = (self.height as usize).saturating_sub(chrome).max(1);
        match self.options.height {
            0 => avail,
            h => avail.min(h as usize),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.options.options.len();
        if len == 0 {
            return;
        }
        let target = self.cursor as isize + delta;
        self.cursor = target.clamp(0, len as isize - 1) as usize;
        self.scroll_to_cursor();
    }

    fn scroll_to_cursor(&mut self) {
        let rows = self.list_height();
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + rows {
            self.offset = self.cursor + 1 - rows;
        }
    }

    fn selected_items(&self) -> Vec<String> {
        let items = &self.options.options;
        if self.selection.is_empty() {
            return items.get(self.cursor).cloned().into_iter().collect();
        }
        let indices = if self.options.ordered {
            self.selection.in_list_order()
        } else {
            self.selection.in_toggle_order().to_vec()
        };
        indices.iter().filter_map(|&i| items.get(i).cloned()).collect()
    }
}

impl Component for ChooseModel {
    fn update(&mut self, msg: Msg) -> Option<Command> {
        let key = key_press(&msg)?;
        if self.state.is_done() {
            return None;
        }
        if is_cancel_key(key) {
            self.state.cancel();
            return None;
        }

        let page = self.list_height() as isize;
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::PageUp => self.move_cursor(-page),
            KeyCode::PageDown => self.move_cursor(page),
            KeyCode::Home | KeyCode::Char('g') => self.move_cursor(isize::MIN / 2),
            KeyCode::End | KeyCode::Char('G') => self.move_cursor(isize::MAX / 2),
            KeyCode::Char('a')
                if key.modifiers.contains(KeyModifiers::CONTROL) && self.options.no_limit =>
            {
                if self.selection.len() == self.options.options.len() {
                    self.selection.clear();
                } else {
                    for i in 0..self.options.options.len() {
                        if !self.selection.contains(i) {
                            self.selection.toggle(i, 0);
                        }
                    }
                }
            }
            KeyCode::Char(' ') | KeyCode::Tab | KeyCode::Char('x') if self.is_multi() => {
                if self.cursor < self.options.options.len() {
                    self.selection.toggle(self.cursor, self.limit());
                }
            }
            KeyCode::Enter => self.state.submit(),
            _ => {}
        }
        None
    }

    fn view(&self) -> String {
        if self.state.is_done() {
            return String::new();
        }
        let p = &self.palette;
        let cursor_mark = if self.options.cursor.is_empty() {
            DEFAULT_CURSOR
        } else {
            self.options.cursor.as_str()
        };
        let blank_mark = " ".repeat(cursor_mark.chars().count());

        let mut lines = self.header();
        for (i, item) in self
            .options
            .options
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(self.list_height())
        {
            let focused = i == self.cursor;
            let mut spans = Vec::with_capacity(3);
            spans.push(if focused {
                Span::styled(cursor_mark.to_string(), Style::default().fg(p.accent))
            } else {
                Span::raw(blank_mark.clone())
            });
            if self.is_multi() {
                let (mark, style) = if self.selection.contains(i) {
                    ("[x] ", Style::default().fg(p.highlight))
                } else {
                    ("[ ] ", Style::default().fg(p.fg_dim))
                };
                spans.push(Span::styled(mark, style));
            }
            let item_style = if focused {
                Style::default().fg(p.highlight).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(p.fg)
            };
            spans.push(Span::styled(item.clone(), item_style));
            lines.push(Line::from(spans));
        }

        let hint = if self.is_multi() {
            match self.limit() {
                0 => format!("space toggle • enter submit • {} selected", self.selection.len()),
                n => format!(
                    "space toggle • enter submit • {}/{} selected",
                    self.selection.len(),
                    n
                ),
            }
        } else {
            "↑/↓ move • enter select • esc cancel".to_string()
        };
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
        self.scroll_to_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::strip;
    use crate::component::test_support::*;

    fn letters(multi: bool) -> ChooseModel {
        ChooseModel::new(ChooseOptions {
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            no_limit: multi,
            ..ChooseOptions::default()
        })
    }

    fn list(model: &ChooseModel) -> Vec<String> {
        match model.result() {
            Ok(ComponentValue::List(items)) => items,
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_single_select_returns_cursor_item() {
        let mut model = letters(false);
        model.update(key(KeyCode::Down));
        model.update(key(KeyCode::Down));
        model.update(key(KeyCode::Enter));
        assert_eq!(list(&model), vec!["C"]);
    }

    #[test]
    fn test_multi_select_preserves_toggle_order() {
        let mut model = letters(true);
        // Toggle C (index 2) first, then A (index 0).
        model.update(key(KeyCode::Down));
        model.update(key(KeyCode::Down));
        model.update(key(KeyCode::Char(' ')));
        model.update(key(KeyCode::Home));
        model.update(key(KeyCode::Char(' ')));
        model.update(key(KeyCode::Enter));
        assert_eq!(list(&model), vec!["C", "A"]);
    }

    #[test]
    fn test_ordered_returns_list_order() {
        let mut model = ChooseModel::new(ChooseOptions {
            options: vec!["A".into(), "B".into(), "C".into()],
            no_limit: true,
            ordered: true,
            ..ChooseOptions::default()
        });
        model.update(key(KeyCode::End));
        model.update(key(KeyCode::Tab));
        model.update(key(KeyCode::Home));
        model.update(key(KeyCode::Tab));
        model.update(key(KeyCode::Enter));
        assert_eq!(list(&model), vec!["A", "C"]);
    }

    #[test]
    fn test_untoggle_removes_from_order() {
        let mut model = letters(true);
        model.update(key(KeyCode::Char('x')));
        model.update(key(KeyCode::Down));
        model.update(key(KeyCode::Char('x')));
        model.update(key(KeyCode::Up));
        model.update(key(KeyCode::Char('x')));
        model.update(key(KeyCode::Enter));
        assert_eq!(list(&model), vec!["B"]);
    }

    #[test]
    fn test_limit_caps_selection() {
        let mut model = ChooseModel::new(ChooseOptions {
            options: vec!["A".into(), "B".into(), "C".into()],
            limit: 2,
            ..ChooseOptions::default()
        });
        for _ in 0..3 {
            model.update(key(KeyCode::Char(' ')));
            model.update(key(KeyCode::Down));
        }
        model.update(key(KeyCode::Enter));
        assert_eq!(list(&model), vec!["A", "B"]);
    }

    #[test]
    fn test_multi_enter_without_toggles_returns_cursor_item() {
        let mut model = letters(true);
        model.update(key(KeyCode::Down));
        model.update(key(KeyCode::Enter));
        assert_eq!(list(&model), vec!["B"]);
    }

    #[test]
    fn test_preselected_item() {
        let mut model = ChooseModel::new(ChooseOptions {
            options: vec!["A".into(), "B".into()],
            selected: "B".into(),
            ..ChooseOptions::default()
        });
        model.update(key(KeyCode::Enter));
        assert_eq!(list(&model), vec!["B"]);
    }

    #[test]
    fn test_list_scrolls_with_cursor() {
        let mut model = ChooseModel::new(ChooseOptions {
            options: (0..20).map(|i| format!("item{:02}", i)).collect(),
            ..ChooseOptions::default()
        });
        model.set_size(30, 6);
        model.update(key(KeyCode::End));
        let view = strip(&model.view());
        assert!(view.contains("item19"));
        assert!(!view.contains("item00"));
        assert_eq!(view.lines().count(), 6);
    }

    #[test]
    fn test_cancel_is_not_empty_result() {
        let mut model = letters(false);
        model.update(key(KeyCode::Esc));
        assert!(matches!(model.result(), Err(TuiError::Cancelled)));
    }
}
