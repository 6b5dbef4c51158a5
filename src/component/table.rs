//! Row picker over tabular data.
//!
//! Rows come from `rows` (with `columns` as headers) or from delimited text
//! in `csv`. `Enter` returns the row under the cursor; `q` cancels like `Esc`.

use crossterm::event::KeyCode;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Paragraph, Row, StatefulWidget, Table, TableState, Widget as _};
use serde::{Deserialize, Serialize};

use super::{
    header_lines, hint_line, is_cancel_key, key_press, Command, Completion, Component,
    ComponentValue, Msg,
};
use crate::ansi::visible_width;
use crate::error::TuiError;
use crate::ui::palette::{ModalPalette, Palette};
use crate::ui::render;

/// A column header, either a bare title or a title with a fixed width.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Title(String),
    Sized {
        title: String,
        #[serde(default)]
        width: u16,
    },
}

impl ColumnSpec {
    pub fn title(&self) -> &str {
        match self {
            ColumnSpec::Title(title) | ColumnSpec::Sized { title, .. } => title,
        }
    }

    /// Fixed width, 0 for automatic.
    pub fn width(&self) -> u16 {
        match self {
            ColumnSpec::Title(_) => 0,
            ColumnSpec::Sized { width, .. } => *width,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    pub title: String,
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<String>>,
    /// Delimited text used when `rows` is empty.
    pub csv: String,
    /// Field separator for `csv`, `,` when empty.
    pub separator: String,
    /// First `csv` line holds the column titles.
    pub has_header: bool,
    /// Visible data rows, 0 to fill the available height.
    pub height: u16,
    pub selected_index: usize,
    pub border: bool,
}

impl TableOptions {
    /// Fill `columns` and `rows` from `csv`.
    pub(crate) fn load_csv(&mut self) {
        let separator = if self.separator.is_empty() {
            ","
        } else {
            self.separator.as_str()
        };
        let split = |line: &str| -> Vec<String> {
            line.split(separator).map(|f| f.trim().to_string()).collect()
        };
        let mut lines = self.csv.trim().lines();
        if self.has_header {
            if let Some(first) = lines.next() {
                self.columns = split(first).into_iter().map(ColumnSpec::Title).collect();
            }
        }
        self.rows = lines.map(split).collect();
        if self.columns.is_empty() {
            let count = self.rows.first().map_or(0, Vec::len);
            self.columns = vec![ColumnSpec::Title(String::new()); count];
        }
    }
}

/// Row chosen from a table; index `-1` and an empty row when nothing was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSelection {
    pub selected_index: i64,
    pub selected_row: Vec<String>,
}

impl TableSelection {
    pub fn none() -> Self {
        Self {
            selected_index: -1,
            selected_row: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct TableModel {
    options: TableOptions,
    widths: Vec<u16>,
    cursor: usize,
    offset: usize,
    palette: Palette,
    state: Completion,
    width: u16,
    height: u16,
}

impl TableModel {
    pub fn new(options: TableOptions) -> Self {
        Self::with_palette(options, Palette::standalone())
    }

    pub fn for_modal(options: TableOptions, palette: &ModalPalette) -> Self {
        Self::with_palette(options, palette.colors.clone())
    }

    fn with_palette(mut options: TableOptions, palette: Palette) -> Self {
        if options.rows.is_empty() && !options.csv.is_empty() {
            options.load_csv();
        }
        let widths = column_widths(&options.columns, &options.rows);
        let cursor = options
            .selected_index
            .min(options.rows.len().saturating_sub(1));
        Self {
            options,
            widths,
            cursor,
            offset: 0,
            palette,
            state: Completion::default(),
            width: 80,
            height: 12,
        }
    }

    pub fn selection(&self) -> TableSelection {
        match self.options.rows.get(self.cursor) {
            Some(row) => TableSelection {
                selected_index: self.cursor as i64,
                selected_row: row.clone(),
            },
            None => TableSelection::none(),
        }
    }

    fn header(&self) -> Vec<Line<'static>> {
        header_lines(&self.options.title, "", &self.palette)
    }

    /// Rows of chrome around the data rows: column header, border, hint.
    fn table_chrome(&self) -> usize {
        1 + if self.options.border { 2 } else { 0 }
    }

    fn list_height(&self) -> usize {
        let chrome = self.header().len() + self.table_chrome() + 1;
        let avail = (self.height as usize).saturating_sub(chrome).max(1);
        match self.options.height {
            0 => avail,
            h => avail.min(h as usize),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.options.rows.is_empty() {
            return;
        }
        let last = self.options.rows.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
        let rows = self.list_height();
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + rows {
            self.offset = self.cursor + 1 - rows;
        }
    }
}

/// Explicit widths where given, otherwise the widest cell of each column.
fn column_widths(columns: &[ColumnSpec], rows: &[Vec<String>]) -> Vec<u16> {
    let count = columns
        .len()
        .max(rows.iter().map(Vec::len).max().unwrap_or(0));
    (0..count)
        .map(|i| {
            let fixed = columns.get(i).map_or(0, ColumnSpec::width);
            if fixed > 0 {
                return fixed;
            }
            let title = columns.get(i).map_or(0, |c| visible_width(c.title()));
            let widest = rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| visible_width(cell))
                .max()
                .unwrap_or(0);
            u16::try_from(title.max(widest)).unwrap_or(u16::MAX)
        })
        .collect()
}

impl Component for TableModel {
    fn update(&mut self, msg: Msg) -> Option<Command> {
        let key = key_press(&msg)?;
        if self.state.is_done() {
            return None;
        }
        if is_cancel_key(key) || key.code == KeyCode::Char('q') {
            self.state.cancel();
            return None;
        }
        let page = self.list_height() as isize;
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::PageUp | KeyCode::Char('b') => self.move_cursor(-page),
            KeyCode::PageDown | KeyCode::Char('f') => self.move_cursor(page),
            KeyCode::Home | KeyCode::Char('g') => self.move_cursor(isize::MIN / 2),
            KeyCode::End | KeyCode::Char('G') => self.move_cursor(isize::MAX / 2),
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
        let base = Style::default().fg(p.fg).bg(p.bg);

        let header = self.header();
        let shown = self
            .options
            .rows
            .len()
            .saturating_sub(self.offset)
            .min(self.list_height())
            .max(1);
        let table_height = shown + self.table_chrome();
        let total = header.len() + table_height + 1;

        let head = Row::new(self.options.columns.iter().map(|c| c.title().to_string()))
            .style(Style::default().fg(p.accent).add_modifier(Modifier::BOLD));
        let rows = self
            .options
            .rows
            .iter()
            .map(|row| Row::new(row.iter().cloned()).style(Style::default().fg(p.fg)));
        let widths = self.widths.iter().map(|&w| Constraint::Length(w));

        let mut table = Table::new(rows, widths)
            .header(head)
            .style(base)
            .row_highlight_style(Style::default().fg(p.highlight).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");
        if self.options.border {
            table = table.block(
                Block::bordered()
                    .border_style(Style::default().fg(p.fg_dim))
                    .style(base),
            );
        }
        let mut state = TableState::default()
            .with_offset(self.offset)
            .with_selected(Some(self.cursor));

        let hint = hint_line("↑/↓ move • enter select • q/esc cancel", p);
        let header_height = u16::try_from(header.len()).unwrap_or(u16::MAX);
        let table_height = u16::try_from(table_height).unwrap_or(u16::MAX);

        render::draw(self.width.max(1), u16::try_from(total).unwrap_or(u16::MAX), |area, buf| {
            let [title_area, table_area, hint_area] = Layout::vertical([
                Constraint::Length(header_height),
                Constraint::Length(table_height),
                Constraint::Length(1),
            ])
            .areas(area);
            Paragraph::new(header).style(base).render(title_area, buf);
            StatefulWidget::render(table, table_area, buf, &mut state);
            Paragraph::new(hint).style(base).render(hint_area, buf);
        })
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    fn result(&self) -> Result<ComponentValue, TuiError> {
        self.state.result(|| ComponentValue::TableRow(self.selection()))
    }

    fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.move_cursor(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::strip;
    use crate::component::test_support::*;
    use serde_json::json;

    fn people() -> TableModel {
        TableModel::new(TableOptions {
            title: "People".into(),
            columns: vec![ColumnSpec::Title("Name".into()), ColumnSpec::Title("Age".into())],
            rows: vec![
                vec!["Ada".into(), "36".into()],
                vec!["Grace".into(), "85".into()],
                vec!["Linus".into(), "54".into()],
            ],
            ..TableOptions::default()
        })
    }

    #[test]
    fn test_enter_returns_row() {
        let mut model = people();
        model.update(key(KeyCode::Down));
        model.update(key(KeyCode::Enter));
        assert_eq!(
            model.result().ok(),
            Some(ComponentValue::TableRow(TableSelection {
                selected_index: 1,
                selected_row: vec!["Grace".into(), "85".into()],
            }))
        );
    }

    #[test]
    fn test_q_cancels() {
        let mut model = people();
        model.update(key(KeyCode::Char('q')));
        assert!(model.is_cancelled());
    }

    #[test]
    fn test_view_renders_headers_and_cursor() {
        let mut model = people();
        model.set_size(30, 10);
        let view = strip(&model.view());
        let lines: Vec<&str> = view.lines().collect();
        assert!(lines[0].starts_with("People"));
        assert!(lines[1].contains("Name"));
        assert!(lines[1].contains("Age"));
        assert!(lines[2].contains("> Ada"));
        assert!(lines.iter().all(|l| l.chars().count() == 30));
    }

    #[test]
    fn test_scrolls_to_cursor() {
        let mut model = TableModel::new(TableOptions {
            columns: vec![ColumnSpec::Title("N".into())],
            rows: (0..30).map(|i| vec![format!("row{:02}", i)]).collect(),
            ..TableOptions::default()
        });
        model.set_size(20, 6);
        model.update(key(KeyCode::End));
        let view = strip(&model.view());
        assert!(view.contains("row29"));
        assert!(!view.contains("row00"));
    }

    #[test]
    fn test_csv_source() {
        let mut model = TableModel::new(TableOptions {
            csv: "name;lang\nferris;rust\ngopher;go\n".into(),
            separator: ";".into(),
            has_header: true,
            ..TableOptions::default()
        });
        model.update(key(KeyCode::End));
        model.update(key(KeyCode::Enter));
        assert_eq!(
            model.selection(),
            TableSelection {
                selected_index: 1,
                selected_row: vec!["gopher".into(), "go".into()],
            }
        );
    }

    #[test]
    fn test_column_specs_deserialize() {
        let options: TableOptions = serde_json::from_value(json!({
            "columns": ["A", {"title": "B", "width": 12}],
            "rows": [["1", "2"]],
        }))
        .expect("options");
        assert_eq!(column_widths(&options.columns, &options.rows), vec![1, 12]);
    }

    #[test]
    fn test_empty_table_selects_nothing() {
        let mut model = TableModel::new(TableOptions::default());
        model.update(key(KeyCode::Enter));
        assert_eq!(
            model.result().ok(),
            Some(ComponentValue::TableRow(TableSelection::none()))
        );
    }
}
