//! File picker.
//!
//! Lists one directory at a time, directories first. `Right`/`l` enters the
//! directory under the cursor, `Left`/`h`/`Backspace` goes to the parent.
//! `Enter` picks the entry under the cursor if its kind is allowed (and, for
//! files, its extension); on a directory that cannot be picked it descends.

use crossterm::event::KeyCode;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{
    header_lines, hint_line, is_cancel_key, key_press, render_lines, Command, Completion,
    Component, ComponentValue, Msg,
};
use crate::error::TuiError;
use crate::ui::palette::{ModalPalette, Palette};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    pub title: String,
    pub description: String,
    /// Starting directory, the working directory when empty.
    #[serde(alias = "current_directory")]
    pub path: String,
    /// Extensions (with or without the dot) that may be picked.
    #[serde(alias = "allowed_extensions")]
    pub allowed_exts: Vec<String>,
    pub show_hidden: bool,
    pub show_size: bool,
    /// Files can be picked. Defaults to true when neither kind is allowed.
    pub file_allowed: bool,
    pub dir_allowed: bool,
    /// Visible rows for the listing, 0 to fill the available height.
    pub height: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    is_dir: bool,
    size: u64,
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Immediate children of `dir`, directories first, each group by name.
fn list_dir(dir: &Path, show_hidden: bool) -> Result<Vec<Entry>, walkdir::Error> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !show_hidden && is_hidden(&name) {
            continue;
        }
        let is_dir = entry.file_type().is_dir()
            || (entry.path_is_symlink() && entry.path().is_dir());
        let size = if is_dir {
            0
        } else {
            entry.metadata().map(|m| m.len()).unwrap_or(0)
        };
        entries.push(Entry { name, is_dir, size });
    }
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];
    if bytes < 1024 {
        return format!("{}B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

#[derive(Debug)]
pub struct FileModel {
    options: FileOptions,
    dir: PathBuf,
    entries: Vec<Entry>,
    error: Option<String>,
    cursor: usize,
    offset: usize,
    picked: Option<PathBuf>,
    palette: Palette,
    state: Completion,
    width: u16,
    height: u16,
}

impl FileModel {
    pub fn new(options: FileOptions) -> Self {
        Self::with_palette(options, Palette::standalone())
    }

    pub fn for_modal(options: FileOptions, palette: &ModalPalette) -> Self {
        Self::with_palette(options, palette.colors.clone())
    }

    fn with_palette(mut options: FileOptions, palette: Palette) -> Self {
        if !options.file_allowed && !options.dir_allowed {
            options.file_allowed = true;
        }
        let dir = if options.path.is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&options.path)
        };
        let mut model = Self {
            options,
            dir: PathBuf::new(),
            entries: Vec::new(),
            error: None,
            cursor: 0,
            offset: 0,
            picked: None,
            palette,
            state: Completion::default(),
            width: 80,
            height: 12,
        };
        model.open(dir);
        model
    }

    /// Directory currently listed.
    pub fn current_dir(&self) -> &Path {
        &self.dir
    }

    fn open(&mut self, dir: PathBuf) {
        match list_dir(&dir, self.options.show_hidden) {
            Ok(entries) => {
                self.entries = entries;
                self.error = None;
            }
            Err(err) => {
                tracing::debug!("Failed to list {}: {}", dir.display(), err);
                self.entries.clear();
                self.error = Some(err.to_string());
            }
        }
        self.dir = dir;
        self.cursor = 0;
        self.offset = 0;
    }

    fn extension_allowed(&self, name: &str) -> bool {
        if self.options.allowed_exts.is_empty() {
            return true;
        }
        let ext = match Path::new(name).extension() {
            Some(ext) => ext.to_string_lossy().to_lowercase(),
            None => return false,
        };
        self.options
            .allowed_exts
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').to_lowercase() == ext)
    }

    fn header(&self) -> Vec<Line<'static>> {
        let mut lines = header_lines(&self.options.title, &self.options.description, &self.palette);
        lines.push(Line::from(Span::styled(
            self.dir.display().to_string(),
            Style::default().fg(self.palette.secondary),
        )));
        lines
    }

    fn list_height(&self) -> usize {
        let chrome = self.header().len() + 1;
        let avail = (self.height as usize).saturating_sub(chrome).max(1);
        match self.options.height {
            0 => avail,
            h => avail.min(h as usize),
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.entries.is_empty() {
            return;
        }
        let last = self.entries.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
        let rows = self.list_height();
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + rows {
            self.offset = self.cursor + 1 - rows;
        }
    }

    fn descend(&mut self) {
        if let Some(entry) = self.entries.get(self.cursor).filter(|e| e.is_dir) {
            let next = self.dir.join(&entry.name);
            self.open(next);
        }
    }

    fn ascend(&mut self) {
        if let Some(parent) = self.dir.parent().map(Path::to_path_buf) {
            let came_from = self.dir.file_name().map(|n| n.to_string_lossy().into_owned());
            self.open(parent);
            if let Some(name) = came_from {
                if let Some(pos) = self.entries.iter().position(|e| e.name == name) {
                    self.move_cursor(pos as isize);
                }
            }
        }
    }

    fn choose(&mut self) {
        let Some(entry) = self.entries.get(self.cursor) else {
            return;
        };
        if entry.is_dir {
            if self.options.dir_allowed {
                self.picked = Some(self.dir.join(&entry.name));
                self.state.submit();
            } else {
                self.descend();
            }
        } else if self.options.file_allowed && self.extension_allowed(&entry.name) {
            self.picked = Some(self.dir.join(&entry.name));
            self.state.submit();
        }
    }
}

impl Component for FileModel {
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
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::PageUp => self.move_cursor(-(self.list_height() as isize)),
            KeyCode::PageDown => self.move_cursor(self.list_height() as isize),
            KeyCode::Home | KeyCode::Char('g') => self.move_cursor(isize::MIN / 2),
            KeyCode::End | KeyCode::Char('G') => self.move_cursor(isize::MAX / 2),
            KeyCode::Right | KeyCode::Char('l') => self.descend(),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Backspace => self.ascend(),
            KeyCode::Enter => self.choose(),
            _ => {}
        }
        None
    }

    fn view(&self) -> String {
        if self.state.is_done() {
            return String::new();
        }
        let p = &self.palette;
        let mut lines = self.header();

        if let Some(err) = &self.error {
            lines.push(Line::from(Span::styled(
                err.clone(),
                Style::default().fg(p.error),
            )));
        } else if self.entries.is_empty() {
            lines.push(hint_line("(empty)", p));
        }

        for (i, entry) in self
            .entries
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(self.list_height())
        {
            let focused = i == self.cursor;
            let selectable = if entry.is_dir {
                true
            } else {
                self.options.file_allowed && self.extension_allowed(&entry.name)
            };
            let style = match (focused, entry.is_dir, selectable) {
                (true, _, _) => Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
                (false, true, _) => Style::default().fg(p.secondary),
                (false, false, true) => Style::default().fg(p.fg),
                (false, false, false) => Style::default().fg(p.fg_dim),
            };
            let mut spans = vec![Span::styled(if focused { "> " } else { "  " }, style)];
            if self.options.show_size {
                let size = if entry.is_dir {
                    String::from("-")
                } else {
                    human_size(entry.size)
                };
                spans.push(Span::styled(
                    format!("{:>7} ", size),
                    Style::default().fg(p.fg_dim),
                ));
            }
            let name = if entry.is_dir {
                format!("{}/", entry.name)
            } else {
                entry.name.clone()
            };
            spans.push(Span::styled(name, style));
            lines.push(Line::from(spans));
        }

        lines.push(hint_line("←/→ navigate • enter select • esc cancel", p));
        render_lines(lines, self.width, p)
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    fn result(&self) -> Result<ComponentValue, TuiError> {
        self.state.result(|| {
            ComponentValue::Text(
                self.picked
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            )
        })
    }

    fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.move_cursor(0);
    }
}
