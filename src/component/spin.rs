//! Spinner shown while a command runs.
//!
//! The command runs on a background thread (returned from `init` as a
//! [`Command::Run`]); its captured output arrives as [`Msg::SpinFinished`].
//! With no command the spinner is done immediately.

use ratatui::style::Style;
use ratatui::text::{Line, Span};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;

use super::{
    is_cancel_key, key_press, render_lines, Command, Completion, Component, ComponentValue, Msg,
};
use crate::error::TuiError;
use crate::ui::palette::{ModalPalette, Palette};

pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

const DOT: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Frames for a named spinner style; unknown names get the braille dots.
pub fn frames(name: &str) -> &'static [&'static str] {
    match name {
        "line" => &["|", "/", "-", "\\"],
        "minidot" => &["⠋", "⠙", "⠚", "⠞", "⠖", "⠦", "⠴", "⠲", "⠳", "⠓"],
        "jump" => &["⢄", "⢂", "⢁", "⡁", "⡈", "⡐", "⡠"],
        "pulse" => &["█", "▓", "▒", "░"],
        "points" => &["∙∙∙", "●∙∙", "∙●∙", "∙∙●"],
        "globe" => &["🌍", "🌎", "🌏"],
        "moon" => &["🌑", "🌒", "🌓", "🌔", "🌕", "🌖", "🌗", "🌘"],
        "meter" => &["▱▱▱", "▰▱▱", "▰▰▱", "▰▰▰", "▰▰▱", "▰▱▱", "▱▱▱"],
        "hamburger" => &["☱", "☲", "☴", "☲"],
        "ellipsis" => &["", ".", "..", "..."],
        _ => DOT,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpinOptions {
    pub title: String,
    /// Spinner style name, see [`frames`].
    #[serde(alias = "type")]
    pub spinner: String,
    /// Program and arguments.
    pub command: Vec<String>,
}

/// Captured result of the spinner's command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpinOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Run `argv` to completion with captured output. Start failures are
/// reported through `stderr` with exit code 1.
pub fn run_captured(argv: &[String]) -> SpinOutput {
    let Some((program, args)) = argv.split_first() else {
        return SpinOutput::default();
    };
    let output = std::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output();
    match output {
        Ok(out) => SpinOutput {
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            exit_code: out.status.code().unwrap_or(1),
        },
        Err(err) => {
            tracing::debug!("Failed to start {}: {}", program, err);
            SpinOutput {
                stdout: String::new(),
                stderr: format!("failed to start {}: {}", program, err),
                exit_code: 1,
            }
        }
    }
}

#[derive(Debug)]
pub struct SpinModel {
    options: SpinOptions,
    frames: &'static [&'static str],
    frame: usize,
    output: SpinOutput,
    palette: Palette,
    state: Completion,
    width: u16,
}

impl SpinModel {
    pub fn new(options: SpinOptions) -> Self {
        Self::with_palette(options, Palette::standalone())
    }

    pub fn for_modal(options: SpinOptions, palette: &ModalPalette) -> Self {
        Self::with_palette(options, palette.colors.clone())
    }

    fn with_palette(options: SpinOptions, palette: Palette) -> Self {
        let mut state = Completion::default();
        if options.command.is_empty() {
            state.submit();
        }
        Self {
            frames: frames(&options.spinner),
            options,
            frame: 0,
            output: SpinOutput::default(),
            palette,
            state,
            width: 80,
        }
    }

    pub fn output(&self) -> &SpinOutput {
        &self.output
    }
}

impl Component for SpinModel {
    fn init(&mut self) -> Option<Command> {
        if self.state.is_done() {
            return None;
        }
        let argv = self.options.command.clone();
        Some(Command::Batch(vec![
            Command::Run(Box::new(move || Msg::SpinFinished(run_captured(&argv)))),
            Command::Tick(TICK_INTERVAL),
        ]))
    }

    fn update(&mut self, msg: Msg) -> Option<Command> {
        if self.state.is_done() {
            return None;
        }
        if let Some(key) = key_press(&msg) {
            if is_cancel_key(key) {
                self.state.cancel();
            }
            return None;
        }
        match msg {
            Msg::Tick => {
                self.frame = (self.frame + 1) % self.frames.len().max(1);
                Some(Command::Tick(TICK_INTERVAL))
            }
            Msg::SpinFinished(output) => {
                self.output = output;
                self.state.submit();
                None
            }
            Msg::Key(_) => None,
        }
    }

    fn view(&self) -> String {
        if self.state.is_done() {
            return String::new();
        }
        let p = &self.palette;
        let frame = self.frames.get(self.frame).copied().unwrap_or_default();
        let line = Line::from(vec![
            Span::styled(frame, Style::default().fg(p.accent)),
            Span::raw(" "),
            Span::styled(self.options.title.clone(), Style::default().fg(p.fg)),
        ]);
        render_lines(vec![line], self.width, p)
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    fn result(&self) -> Result<ComponentValue, TuiError> {
        self.state.result(|| ComponentValue::Spin(self.output.clone()))
    }

    fn set_size(&mut self, width: u16, _height: u16) {
        self.width = width;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::strip;
    use crate::component::test_support::*;
    use crossterm::event::KeyCode;

    fn spinner(command: &[&str]) -> SpinModel {
        SpinModel::new(SpinOptions {
            title: "Working".into(),
            command: command.iter().map(|s| s.to_string()).collect(),
            ..SpinOptions::default()
        })
    }

    #[test]
    fn test_init_batches_command_and_tick() {
        let mut model = spinner(&["true"]);
        match model.init() {
            Some(Command::Batch(cmds)) => {
                assert_eq!(cmds.len(), 2);
                assert!(matches!(cmds[0], Command::Run(_)));
                assert!(matches!(cmds[1], Command::Tick(d) if d == TICK_INTERVAL));
            }
            other => panic!("unexpected init command: {:?}", other),
        }
    }

    #[test]
    fn test_tick_advances_frame_and_reschedules() {
        let mut model = spinner(&["true"]);
        model.set_size(20, 1);
        assert!(strip(&model.view()).starts_with("⠋ Working"));
        let next = model.update(Msg::Tick);
        assert!(matches!(next, Some(Command::Tick(_))));
        assert!(strip(&model.view()).starts_with("⠙ Working"));
    }

    #[test]
    fn test_finished_message_completes() {
        let mut model = spinner(&["true"]);
        let output = SpinOutput {
            stdout: "hi\n".into(),
            stderr: String::new(),
            exit_code: 0,
        };
        model.update(Msg::SpinFinished(output.clone()));
        assert!(model.is_done());
        assert!(!model.is_cancelled());
        assert_eq!(model.result().ok(), Some(ComponentValue::Spin(output)));
        assert!(model.update(Msg::Tick).is_none());
    }

    #[test]
    fn test_without_command_is_done() {
        let mut model = spinner(&[]);
        assert!(model.is_done());
        assert!(model.init().is_none());
    }

    #[test]
    fn test_escape_cancels() {
        let mut model = spinner(&["true"]);
        model.update(key(KeyCode::Esc));
        assert!(model.is_cancelled());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captured_collects_streams_and_code() {
        let out = run_captured(&[
            "sh".to_string(),
            "-c".to_string(),
            "echo out; echo err >&2; exit 3".to_string(),
        ]);
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn test_run_captured_reports_start_failure() {
        let out = run_captured(&["definitely-not-a-real-binary-xyz".to_string()]);
        assert_eq!(out.exit_code, 1);
        assert!(out.stderr.contains("definitely-not-a-real-binary-xyz"));
    }

    #[test]
    fn test_frame_sets() {
        assert_eq!(frames("line"), &["|", "/", "-", "\\"]);
        assert_eq!(frames("unknown").len(), 10);
    }
}
