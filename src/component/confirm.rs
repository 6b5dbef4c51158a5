//! Yes/no confirmation.
//!
//! `Left`/`Right`/`h`/`l`/`Tab` move between the buttons, `Enter` submits the
//! focused one, `y` and `n` submit directly.

use crossterm::event::KeyCode;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde::Deserialize;

use super::{
    header_lines, is_cancel_key, key_press, render_lines, Command, Completion, Component,
    ComponentValue, Msg,
};
use crate::error::TuiError;
use crate::ui::palette::{ModalPalette, Palette};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfirmOptions {
    pub title: String,
    pub description: String,
    /// Label of the positive button, `Yes` when empty.
    pub affirmative: String,
    /// Label of the negative button, `No` when empty.
    pub negative: String,
    /// Initially focused answer.
    pub default: bool,
}

#[derive(Debug)]
pub struct ConfirmModel {
    options: ConfirmOptions,
    choice: bool,
    palette: Palette,
    state: Completion,
    width: u16,
}

impl ConfirmModel {
    pub fn new(options: ConfirmOptions) -> Self {
        Self::with_palette(options, Palette::standalone())
    }

    pub fn for_modal(options: ConfirmOptions, palette: &ModalPalette) -> Self {
        Self::with_palette(options, palette.colors.clone())
    }

    fn with_palette(options: ConfirmOptions, palette: Palette) -> Self {
        Self {
            choice: options.default,
            options,
            palette,
            state: Completion::default(),
            width: 80,
        }
    }

    fn affirmative(&self) -> &str {
        if self.options.affirmative.is_empty() {
            "Yes"
        } else {
            &self.options.affirmative
        }
    }

    fn negative(&self) -> &str {
        if self.options.negative.is_empty() {
            "No"
        } else {
            &self.options.negative
        }
    }

    fn button(&self, label: &str, focused: bool) -> Span<'static> {
        let style = if focused {
            Style::default()
                .fg(self.palette.on_accent())
                .bg(self.palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.palette.fg_dim)
        };
        Span::styled(format!("  {}  ", label), style)
    }
}

impl Component for ConfirmModel {
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
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                self.choice = !self.choice;
            }
            KeyCode::Char('h') => self.choice = true,
            KeyCode::Char('l') => self.choice = false,
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.choice = true;
                self.state.submit();
            }
            KeyCode::Char('n') | KeyCode::Char('N') => {
                self.choice = false;
                self.state.submit();
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
        let mut lines = header_lines(&self.options.title, &self.options.description, &self.palette);
        lines.push(Line::from(vec![
            self.button(self.affirmative(), self.choice),
            Span::raw(" "),
            self.button(self.negative(), !self.choice),
        ]));
        render_lines(lines, self.width, &self.palette)
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    fn result(&self) -> Result<ComponentValue, TuiError> {
        self.state.result(|| ComponentValue::Bool(self.choice))
    }

    fn set_size(&mut self, width: u16, _height: u16) {
        self.width = width;
    }
}
