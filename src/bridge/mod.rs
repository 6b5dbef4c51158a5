//! # Interactive Execution Bridges
//!
//! Run a child process full-screen while its output scrolls in a viewport,
//! keystrokes reach the child, and (PTY mode only) the child can ask for a
//! widget to be drawn as a modal over its own output.
//!
//! ## State machine
//!
//! ```text
//!             overlay request               child exits
//!  Executing ───────────────► ShowingOverlay      │
//!      ▲                          │               ▼
//!      └──── widget done ─────────┘           Completed  (scroll only)
//! ```
//!
//! ## Threads
//!
//! One loop owns all session state. Everything else only produces
//! [`BridgeEvent`]s into a channel: the input thread, one reader per output
//! stream, the process waiter, the control server, and widget commands.
//!
//! ## Modes
//!
//! - [`pty`]: the child gets a pseudo-terminal, echo comes from the terminal
//!   driver, widgets can be requested through the control server.
//! - [`pipe`]: the child gets plain pipes; typed input is echoed locally and
//!   dropped again as soon as the child produces output.

pub mod pipe;
pub mod pty;

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::style::{Modifier, Style};
use std::io::Read;
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use crate::ansi::{fit_to_width, StreamFilter};
use crate::component::{Command, Msg};
use crate::config::OutputStream;
use crate::server::OverlayRequest;
use crate::ui::palette::Palette;
use crate::ui::render::paint;
use crate::ui::terminal::{CrosstermEventReader, InputThread, Screen};
use crate::ui::Viewport;

/// Title + separator.
pub const HEADER_HEIGHT: u16 = 2;
/// Status line.
pub const FOOTER_HEIGHT: u16 = 1;

/// Exit code reported when the session is force-quit before the child ends.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How long the process waiter gives the output readers to drain after the
/// child exits.
pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Executing,
    ShowingOverlay,
    Completed,
}

/// Outcome of an interactive run.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveResult {
    pub exit_code: i32,
    /// Set when the child could not be waited on or the executor failed.
    pub error: Option<String>,
    pub duration: Duration,
}

impl InteractiveResult {
    pub fn exited(exit_code: i32, duration: Duration) -> Self {
        Self {
            exit_code,
            error: None,
            duration,
        }
    }

    pub fn failed(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            exit_code: 1,
            error: Some(error.into()),
            duration,
        }
    }

    /// The result of a session the user left with the force-quit key.
    pub fn interrupted() -> Self {
        Self {
            exit_code: INTERRUPTED_EXIT_CODE,
            error: Some("execution interrupted".to_string()),
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }

    /// Headline of the completion summary.
    pub fn status_text(&self) -> String {
        if self.is_success() {
            "COMPLETED SUCCESSFULLY".to_string()
        } else if let Some(error) = &self.error {
            format!("FAILED: {}", error)
        } else {
            format!("EXITED WITH CODE {}", self.exit_code)
        }
    }
}

/// Everything a session loop reacts to.
#[derive(Debug)]
pub enum BridgeEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    /// Display-ready text from one of the child's output streams.
    Output(String),
    Exited(InteractiveResult),
    /// A widget requested through the control server (PTY mode).
    Overlay(OverlayRequest),
    /// A message produced by a command of the widget opened as the given
    /// generation.
    Component(u64, Msg),
}

/// Map a terminal event onto a session event.
pub fn input_event(event: Event) -> Option<BridgeEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(BridgeEvent::Key(key)),
        Event::Resize(w, h) => Some(BridgeEvent::Resize(w, h)),
        _ => None,
    }
}

/// Ctrl+\ (some terminals report it as Ctrl+4).
pub fn is_force_quit(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('\\') | KeyCode::Char('4'))
}

/// Bytes a terminal would send for `key`, or `None` for keys with no
/// encoding.
pub fn key_to_bytes(key: &KeyEvent) -> Option<Vec<u8>> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    let mut bytes = match key.code {
        KeyCode::Char(c) if ctrl => vec![control_byte(c)?],
        KeyCode::Char(c) => c.to_string().into_bytes(),
        KeyCode::Enter => b"\r".to_vec(),
        KeyCode::Tab => b"\t".to_vec(),
        KeyCode::BackTab => b"\x1b[Z".to_vec(),
        KeyCode::Backspace => vec![0x7f],
        KeyCode::Delete => b"\x1b[3~".to_vec(),
        KeyCode::Up => b"\x1b[A".to_vec(),
        KeyCode::Down => b"\x1b[B".to_vec(),
        KeyCode::Right => b"\x1b[C".to_vec(),
        KeyCode::Left => b"\x1b[D".to_vec(),
        KeyCode::Home => b"\x1b[H".to_vec(),
        KeyCode::End => b"\x1b[F".to_vec(),
        KeyCode::PageUp => b"\x1b[5~".to_vec(),
        KeyCode::PageDown => b"\x1b[6~".to_vec(),
        KeyCode::Esc => vec![0x1b],
        _ => return None,
    };

    if alt && key.code != KeyCode::Esc {
        bytes.insert(0, 0x1b);
    }
    Some(bytes)
}

/// C0 control code for Ctrl+`c`.
fn control_byte(c: char) -> Option<u8> {
    match c {
        'a'..='z' | 'A'..='Z' => Some((c.to_ascii_lowercase() as u8) & 0x1f),
        ' ' | '@' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '/' | '7' => Some(0x1f),
        _ => None,
    }
}

/// Scrollback navigation once the child has exited. Returns true when the
/// key ends the session.
pub(crate) fn review_key(viewport: &mut Viewport, key: &KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return key.code == KeyCode::Char('c');
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => return true,
        KeyCode::Up | KeyCode::Char('k') => viewport.line_up(1),
        KeyCode::Down | KeyCode::Char('j') => viewport.line_down(1),
        KeyCode::PageUp | KeyCode::Char('b') => viewport.half_page_up(),
        KeyCode::PageDown | KeyCode::Char('f') | KeyCode::Char(' ') => {
            viewport.half_page_down();
        }
        KeyCode::Home | KeyCode::Char('g') => viewport.goto_top(),
        KeyCode::End | KeyCode::Char('G') => viewport.goto_bottom(),
        _ => {}
    }
    false
}

/// Viewport height for a terminal `height` rows tall.
pub fn viewport_height(height: u16) -> u16 {
    height.saturating_sub(HEADER_HEIGHT + FOOTER_HEIGHT).max(1)
}

/// Compact duration text rounded to milliseconds: `0s`, `15ms`, `1.5s`,
/// `2m3.25s`, `1h0m5s`.
pub fn format_duration(duration: Duration) -> String {
    let ms = (duration.as_micros() + 500) / 1000;
    if ms == 0 {
        return "0s".to_string();
    }
    if ms < 1000 {
        return format!("{}ms", ms);
    }

    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let secs = (ms / 1000) % 60;
    let frac = ms % 1000;

    let mut seconds = secs.to_string();
    if frac > 0 {
        let digits = format!("{:03}", frac);
        seconds.push('.');
        seconds.push_str(digits.trim_end_matches('0'));
    }

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Styled block appended to the scrollback when the child exits.
pub fn completion_summary(result: &InteractiveResult) -> String {
    let p = Palette::standalone();
    let dim = Style::default().fg(p.fg_dim);
    let status_color = if result.is_success() {
        p.success
    } else {
        p.error
    };

    let mut out = String::new();
    out.push_str("\n\n");
    out.push_str(&paint(&"-".repeat(50), dim));
    out.push_str("\n\n");
    out.push_str(&paint(
        &result.status_text(),
        Style::default()
            .fg(status_color)
            .add_modifier(Modifier::BOLD),
    ));
    out.push('\n');
    out.push_str(&paint(
        &format!("Duration: {}", format_duration(result.duration)),
        dim,
    ));
    out.push_str("\n\n");
    out.push_str(&paint(
        "Press Enter to return to terminal...",
        Style::default()
            .fg(p.highlight)
            .add_modifier(Modifier::ITALIC),
    ));
    out.push('\n');
    out
}

/// Header, scrollback and footer of a session screen.
pub(crate) struct Chrome<'a> {
    pub title: &'a str,
    pub command_name: &'a str,
    pub width: u16,
    /// Set once the child has exited.
    pub result: Option<&'a InteractiveResult>,
}

impl Chrome<'_> {
    pub(crate) fn render(&self, viewport: &Viewport) -> String {
        let p = Palette::standalone();
        let width = self.width as usize;

        let mut title = paint(
            self.title,
            Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
        );
        if !self.command_name.is_empty() {
            title.push(' ');
            title.push_str(&paint(self.command_name, Style::default().fg(p.secondary)));
        }
        let separator = paint(&"-".repeat(width), Style::default().fg(p.rule));

        let dim = Style::default().fg(p.fg_dim);
        let mut footer = match self.result {
            Some(result) => {
                let (label, color) = if result.is_success() {
                    ("Done", p.success)
                } else {
                    ("Failed", p.error)
                };
                let mut s = paint(label, Style::default().fg(color));
                s.push_str(&paint("  |  arrows: scroll  |  Enter/q: exit", dim));
                s
            }
            None => {
                let mut s = paint("Running...", Style::default().fg(p.warning));
                s.push_str(&paint("  |  Ctrl+\\: force quit", dim));
                s
            }
        };
        footer.push_str(&paint(
            &format!("  {:3.0}%", viewport.scroll_percent() * 100.0),
            dim,
        ));

        let mut lines = Vec::with_capacity(viewport.height() as usize + 3);
        lines.push(fit_to_width(&title, width));
        lines.push(separator);
        lines.extend(
            viewport
                .visible_lines()
                .into_iter()
                .map(|line| fit_to_width(line, width)),
        );
        lines.push(fit_to_width(&footer, width));
        lines.join("\n")
    }
}

/// What the shared loop needs from a session.
pub trait Session {
    /// Apply one event. A returned command belongs to the active widget and
    /// is run by the loop.
    fn handle(&mut self, event: BridgeEvent) -> Option<Command>;

    fn view(&self) -> String;

    fn is_finished(&self) -> bool;

    /// Tag for messages of commands returned by the last `handle`. Messages
    /// come back as [`BridgeEvent::Component`] carrying it.
    fn generation(&self) -> u64 {
        0
    }
}

/// The session loop without the terminal: sizes the session, then applies
/// events and redraws until the session is finished or every producer is
/// gone. Events already queued are applied before the next draw.
pub fn drive<S, D>(
    session: &mut S,
    (width, height): (u16, u16),
    tx: &Sender<BridgeEvent>,
    rx: &Receiver<BridgeEvent>,
    mut draw: D,
) -> Result<()>
where
    S: Session,
    D: FnMut(&str) -> Result<()>,
{
    apply(session, BridgeEvent::Resize(width, height), tx);

    loop {
        draw(&session.view())?;
        if session.is_finished() {
            break;
        }
        let Ok(event) = rx.recv() else {
            tracing::debug!("session channel closed");
            break;
        };
        apply(session, event, tx);
        while !session.is_finished() {
            match rx.try_recv() {
                Ok(event) => apply(session, event, tx),
                Err(_) => break,
            }
        }
    }
    Ok(())
}

fn apply<S: Session>(session: &mut S, event: BridgeEvent, tx: &Sender<BridgeEvent>) {
    if let Some(command) = session.handle(event) {
        let generation = session.generation();
        command.spawn(tx, move |msg| BridgeEvent::Component(generation, msg));
    }
}

/// Read a child's output stream until end of stream or error and send it as
/// [`BridgeEvent::Output`]. Read errors only stop this reader. Signals
/// `drained` when done.
pub(crate) fn spawn_reader<R>(mut reader: R, tx: Sender<BridgeEvent>, drained: Sender<()>)
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut filter = StreamFilter::new();
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let text = filter.push(&buf[..n]);
                    if !text.is_empty() && tx.send(BridgeEvent::Output(text)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "output reader stopped");
                    break;
                }
            }
        }
        let rest = filter.finish();
        if !rest.is_empty() {
            let _ = tx.send(BridgeEvent::Output(rest));
        }
        let _ = drained.send(());
    });
}

/// Take over the terminal and drive `session` on it.
pub(crate) fn run_on_screen<S: Session>(
    session: &mut S,
    tx: &Sender<BridgeEvent>,
    rx: &Receiver<BridgeEvent>,
) -> Result<()> {
    let mut screen = Screen::enter(OutputStream::Stdout)?;
    let size = Screen::size().unwrap_or((80, 24));
    let input = InputThread::spawn(Box::new(CrosstermEventReader), tx.clone(), input_event);

    let outcome = drive(session, size, tx, rx, |frame| screen.draw(frame));

    input.stop();
    screen.restore()?;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::strip;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_encoding() {
        let none = KeyModifiers::empty();
        assert_eq!(key_to_bytes(&press(KeyCode::Enter, none)), Some(b"\r".to_vec()));
        assert_eq!(key_to_bytes(&press(KeyCode::Backspace, none)), Some(vec![0x7f]));
        assert_eq!(key_to_bytes(&press(KeyCode::Up, none)), Some(b"\x1b[A".to_vec()));
        assert_eq!(key_to_bytes(&press(KeyCode::Delete, none)), Some(b"\x1b[3~".to_vec()));
        assert_eq!(key_to_bytes(&press(KeyCode::PageDown, none)), Some(b"\x1b[6~".to_vec()));
        assert_eq!(key_to_bytes(&press(KeyCode::Char('é'), none)), Some("é".as_bytes().to_vec()));
        assert_eq!(key_to_bytes(&press(KeyCode::F(5), none)), None);
    }

    #[test]
    fn test_control_and_alt_keys() {
        let ctrl = KeyModifiers::CONTROL;
        assert_eq!(key_to_bytes(&press(KeyCode::Char('c'), ctrl)), Some(vec![0x03]));
        assert_eq!(key_to_bytes(&press(KeyCode::Char('d'), ctrl)), Some(vec![0x04]));
        assert_eq!(key_to_bytes(&press(KeyCode::Char('z'), ctrl)), Some(vec![0x1a]));
        assert_eq!(key_to_bytes(&press(KeyCode::Esc, KeyModifiers::empty())), Some(vec![0x1b]));
        assert_eq!(
            key_to_bytes(&press(KeyCode::Char('b'), KeyModifiers::ALT)),
            Some(b"\x1bb".to_vec())
        );
    }

    #[test]
    fn test_force_quit_combination() {
        assert!(is_force_quit(&press(KeyCode::Char('\\'), KeyModifiers::CONTROL)));
        assert!(is_force_quit(&press(KeyCode::Char('4'), KeyModifiers::CONTROL)));
        assert!(!is_force_quit(&press(KeyCode::Char('\\'), KeyModifiers::empty())));
        assert!(!is_force_quit(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn test_review_keys_scroll_and_exit() {
        let mut vp = Viewport::new(10, 4);
        vp.set_content(&(0..20).map(|i| i.to_string()).collect::<Vec<_>>().join("\n"));
        vp.goto_bottom();
        let none = KeyModifiers::empty();

        assert!(!review_key(&mut vp, &press(KeyCode::Char('k'), none)));
        assert_eq!(vp.offset(), 15);
        assert!(!review_key(&mut vp, &press(KeyCode::PageUp, none)));
        assert_eq!(vp.offset(), 13);
        assert!(!review_key(&mut vp, &press(KeyCode::Char('g'), none)));
        assert_eq!(vp.offset(), 0);
        assert!(!review_key(&mut vp, &press(KeyCode::Char(' '), none)));
        assert_eq!(vp.offset(), 2);
        assert!(!review_key(&mut vp, &press(KeyCode::Char('G'), none)));
        assert_eq!(vp.offset(), 16);

        assert!(review_key(&mut vp, &press(KeyCode::Char('q'), none)));
        assert!(review_key(&mut vp, &press(KeyCode::Enter, none)));
        assert!(review_key(&mut vp, &press(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_micros(15_400)), "15ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_millis(2000)), "2s");
        assert_eq!(format_duration(Duration::from_millis(123_250)), "2m3.25s");
        assert_eq!(format_duration(Duration::from_secs(3605)), "1h0m5s");
    }

    #[test]
    fn test_status_text() {
        let ok = InteractiveResult::exited(0, Duration::ZERO);
        assert_eq!(ok.status_text(), "COMPLETED SUCCESSFULLY");
        let code = InteractiveResult::exited(2, Duration::ZERO);
        assert_eq!(code.status_text(), "EXITED WITH CODE 2");
        let failed = InteractiveResult::failed("wait failed", Duration::ZERO);
        assert_eq!(failed.status_text(), "FAILED: wait failed");

        let interrupted = InteractiveResult::interrupted();
        assert_eq!(interrupted.exit_code, 130);
        assert_eq!(interrupted.error.as_deref(), Some("execution interrupted"));
    }

    #[test]
    fn test_completion_summary_layout() {
        let summary = completion_summary(&InteractiveResult::exited(3, Duration::from_millis(42)));
        let plain = strip(&summary);
        let expected = format!(
            "\n\n{}\n\nEXITED WITH CODE 3\nDuration: 42ms\n\nPress Enter to return to terminal...\n",
            "-".repeat(50)
        );
        assert_eq!(plain, expected);
        assert!(summary.contains("\x1b[1;38;2;239;68;68mEXITED WITH CODE 3"));
    }

    #[test]
    fn test_chrome_layout() {
        let mut vp = Viewport::new(50, viewport_height(6));
        vp.set_content("one\ntwo\nthree\nfour");
        vp.goto_bottom();
        let chrome = Chrome {
            title: "Running Command",
            command_name: "make",
            width: 50,
            result: None,
        };
        let frame = chrome.render(&vp);
        let lines: Vec<String> = frame.split('\n').map(strip).collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0].trim_end(), "Running Command make");
        assert_eq!(lines[1], "-".repeat(50));
        assert_eq!(lines[2].trim_end(), "two");
        assert_eq!(lines[4].trim_end(), "four");
        assert!(lines[5].starts_with("Running...  |  Ctrl+\\: force quit"));
        assert!(lines.iter().all(|l| l.chars().count() == 50));
    }

    #[test]
    fn test_chrome_footer_after_completion() {
        let vp = Viewport::new(80, 3);
        let result = InteractiveResult::exited(1, Duration::ZERO);
        let chrome = Chrome {
            title: "T",
            command_name: "",
            width: 80,
            result: Some(&result),
        };
        let frame = chrome.render(&vp);
        let footer = strip(frame.split('\n').last().unwrap_or_default());
        assert!(footer.starts_with("Failed  |  arrows: scroll  |  Enter/q: exit  100%"));
    }
}
