//! # Pipe Bridge
//!
//! Runs an executor that only gets byte streams: a stdin reader and stdout
//! and stderr writers. Pipes have no terminal driver, so nothing echoes what
//! the user types. The session echoes locally instead:
//!
//! - typed characters go to the child at once and into a pending line
//! - Enter moves the pending line into the transcript and sends `\n`
//! - any child output first drops the pending line, then is appended
//!
//! The last rule keeps a child that prints what it read from showing the
//! input twice.
//!
//! ```text
//! type "hi"       transcript: ""            pending: "hi"
//! Enter           transcript: "hi\n"        pending: ""
//! child "ok\n"    transcript: "hi\nok\n"    pending: ""
//! ```

use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::io::{PipeReader, PipeWriter, Write};
use std::process::Stdio;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use super::{
    completion_summary, is_force_quit, key_to_bytes, review_key, run_on_screen, spawn_reader,
    viewport_height, BridgeEvent, Chrome, ExecutionState, InteractiveResult, Session,
    DRAIN_TIMEOUT,
};
use crate::component::Command;
use crate::config::ENV_INTERACTIVE;
use crate::error::TuiError;
use crate::server::Response;
use crate::ui::Viewport;

#[derive(Debug, Clone)]
pub struct PipeOptions {
    pub title: String,
    pub command_name: String,
    /// Show typed characters. Turn off for secrets.
    pub echo_input: bool,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            title: "Running Command".to_string(),
            command_name: String::new(),
            echo_input: true,
        }
    }
}

/// The streams handed to an executor.
#[derive(Debug)]
pub struct PipeIo {
    pub stdin: PipeReader,
    pub stdout: PipeWriter,
    pub stderr: PipeWriter,
}

#[derive(Debug, Default)]
struct Buffers {
    content: String,
    pending: String,
}

/// Committed output plus the line being typed, behind one lock. Clones
/// share the same buffers.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    inner: Arc<Mutex<Buffers>>,
}

impl Transcript {
    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Committed text: output and entered lines.
    pub fn content(&self) -> String {
        self.lock().content.clone()
    }

    /// The echoed line not yet committed.
    pub fn pending_input(&self) -> String {
        self.lock().pending.clone()
    }

    fn display(&self) -> String {
        let buffers = self.lock();
        format!("{}{}", buffers.content, buffers.pending)
    }

    fn push_pending(&self, s: &str) {
        self.lock().pending.push_str(s);
    }

    /// Drop the last character, however many bytes it takes.
    fn pop_pending(&self) {
        self.lock().pending.pop();
    }

    fn commit_line(&self) {
        let mut buffers = self.lock();
        let line = std::mem::take(&mut buffers.pending);
        buffers.content.push_str(&line);
        buffers.content.push('\n');
    }

    fn append_output(&self, text: &str) {
        let mut buffers = self.lock();
        buffers.pending.clear();
        buffers.content.push_str(text);
    }
}

/// State of one pipe session.
pub struct PipeSession {
    options: PipeOptions,
    state: ExecutionState,
    transcript: Transcript,
    stdin: Option<Box<dyn Write + Send>>,
    viewport: Viewport,
    width: u16,
    height: u16,
    result: Option<InteractiveResult>,
    quit: bool,
}

impl PipeSession {
    pub fn new(options: PipeOptions, stdin: Box<dyn Write + Send>) -> Self {
        Self {
            options,
            state: ExecutionState::Executing,
            transcript: Transcript::default(),
            stdin: Some(stdin),
            viewport: Viewport::default(),
            width: 0,
            height: 0,
            result: None,
            quit: false,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }

    pub fn stdin_closed(&self) -> bool {
        self.stdin.is_none()
    }

    /// End the session; without a finished executor the result is
    /// [`InteractiveResult::interrupted`].
    pub fn into_result(mut self) -> InteractiveResult {
        self.close_stdin();
        self.result.unwrap_or_else(InteractiveResult::interrupted)
    }

    /// Closing twice is a no-op.
    fn close_stdin(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.flush();
        }
    }

    fn send(&mut self, bytes: &[u8]) {
        let Some(stdin) = self.stdin.as_mut() else {
            return;
        };
        if let Err(e) = stdin.write_all(bytes).and_then(|()| stdin.flush()) {
            tracing::debug!(error = %e, "child stdin closed");
            self.stdin = None;
        }
    }

    fn refresh(&mut self) {
        self.viewport.set_content(&self.transcript.display());
        if self.state == ExecutionState::Executing {
            self.viewport.goto_bottom();
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) {
        if self.state == ExecutionState::Completed {
            if review_key(&mut self.viewport, key) {
                self.quit = true;
            }
            return;
        }

        if is_force_quit(key) {
            tracing::debug!("force quit requested");
            self.close_stdin();
            self.quit = true;
            return;
        }
        if self.stdin.is_none() {
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
        let echo = self.options.echo_input;
        match key.code {
            KeyCode::Enter => {
                self.transcript.commit_line();
                self.send(b"\n");
            }
            KeyCode::Backspace => {
                self.send(&[0x7f]);
                self.transcript.pop_pending();
            }
            KeyCode::Tab => {
                self.send(b"\t");
                if echo {
                    self.transcript.push_pending("\t");
                }
            }
            KeyCode::Char(c) if plain => {
                let mut utf8 = [0u8; 4];
                let s = c.encode_utf8(&mut utf8);
                self.send(s.as_bytes());
                if echo {
                    self.transcript.push_pending(s);
                }
            }
            KeyCode::Char(_) | KeyCode::Esc => {
                if let Some(bytes) = key_to_bytes(key) {
                    self.send(&bytes);
                }
            }
            _ => return,
        }
        self.refresh();
    }

    fn handle_exit(&mut self, result: InteractiveResult) {
        tracing::debug!(exit_code = result.exit_code, error = ?result.error, "executor finished");
        self.close_stdin();
        self.transcript.append_output(&completion_summary(&result));
        self.result = Some(result);
        self.state = ExecutionState::Completed;
        self.refresh();
        self.viewport.goto_bottom();
    }
}

impl Session for PipeSession {
    fn handle(&mut self, event: BridgeEvent) -> Option<Command> {
        match event {
            BridgeEvent::Key(key) => self.handle_key(&key),
            BridgeEvent::Resize(w, h) => {
                self.width = w;
                self.height = h;
                self.viewport.set_size(w, viewport_height(h));
            }
            BridgeEvent::Output(text) => {
                self.transcript.append_output(&text);
                self.refresh();
            }
            BridgeEvent::Exited(result) => self.handle_exit(result),
            BridgeEvent::Overlay(request) => {
                request.reply(Response::error("components are not available in pipe mode"));
            }
            BridgeEvent::Component(..) => {}
        }
        None
    }

    fn view(&self) -> String {
        if self.width == 0 || self.height == 0 {
            return "Initializing...".to_string();
        }
        Chrome {
            title: &self.options.title,
            command_name: &self.options.command_name,
            width: self.width,
            result: self.result.as_ref(),
        }
        .render(&self.viewport)
    }

    fn is_finished(&self) -> bool {
        self.quit
    }
}

/// Run `executor` behind pipes on the whole terminal. The executor's `Ok`
/// value is the exit code; an `Err` is shown as a failure with exit code 1.
pub fn run<F>(options: PipeOptions, executor: F) -> Result<InteractiveResult>
where
    F: FnOnce(PipeIo) -> Result<i32> + Send + 'static,
{
    let (stdin_r, stdin_w) = std::io::pipe().context("Failed to create stdin pipe")?;
    let (stdout_r, stdout_w) = std::io::pipe().context("Failed to create stdout pipe")?;
    let (stderr_r, stderr_w) = std::io::pipe().context("Failed to create stderr pipe")?;

    let (tx, rx) = mpsc::channel();
    let (drained_tx, drained_rx) = mpsc::channel();
    spawn_reader(stdout_r, tx.clone(), drained_tx.clone());
    spawn_reader(stderr_r, tx.clone(), drained_tx);

    let done = tx.clone();
    std::thread::spawn(move || {
        let started = Instant::now();
        let io = PipeIo {
            stdin: stdin_r,
            stdout: stdout_w,
            stderr: stderr_w,
        };
        let result = match executor(io) {
            Ok(code) => InteractiveResult::exited(code, started.elapsed()),
            Err(e) => InteractiveResult::failed(format!("{:#}", e), started.elapsed()),
        };
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        for _ in 0..2 {
            let left = deadline.saturating_duration_since(Instant::now());
            if drained_rx.recv_timeout(left).is_err() {
                break;
            }
        }
        let _ = done.send(BridgeEvent::Exited(result));
    });

    let mut session = PipeSession::new(options, Box::new(stdin_w));
    let outcome = run_on_screen(&mut session, &tx, &rx);
    let result = session.into_result();
    outcome?;
    Ok(result)
}

/// Executor that runs `argv` as a child process on the pipes and reports
/// its exit code.
pub fn command_executor(argv: Vec<String>) -> impl FnOnce(PipeIo) -> Result<i32> + Send + 'static {
    move |io| {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| TuiError::ProcessStart("no command given".to_string()))?;
        let status = std::process::Command::new(program)
            .args(args)
            .env(ENV_INTERACTIVE, "1")
            .stdin(Stdio::from(io.stdin))
            .stdout(Stdio::from(io.stdout))
            .stderr(Stdio::from(io.stderr))
            .status()
            .map_err(|e| TuiError::ProcessStart(format!("{}: {}", program, e)))?;
        Ok(status.code().unwrap_or(1))
    }
}
