//! # PTY Bridge
//!
//! Runs a command inside a pseudo-terminal with `portable-pty` and shows its
//! output in a scrollback viewport. While the command runs, keys are encoded
//! the way a terminal would send them and written to the PTY. A child can
//! request a widget through the control server; the widget is drawn as a
//! modal over the output and gets every key until it is done.
//!
//! ## Threads
//!
//! - reader: PTY output, reassembled by a [`crate::ansi::StreamFilter`]
//! - waiter: blocks on the child, then reports [`BridgeEvent::Exited`]
//! - control server: one thread per HTTP request
//!
//! All of them only send events; [`PtySession`] is touched by the loop alone.

use anyhow::{Context, Result};
use portable_pty::{CommandBuilder, MasterPty, NativePtySystem, PtySize, PtySystem};
use std::io::Write;
use std::sync::mpsc::{self, Sender};
use std::time::Instant;

use super::{
    completion_summary, is_force_quit, key_to_bytes, review_key, run_on_screen, spawn_reader,
    viewport_height, BridgeEvent, Chrome, ExecutionState, InteractiveResult, Session,
    DRAIN_TIMEOUT,
};
use crate::component::{create, wire_result, Command, Component, ComponentKind, Msg, Widget};
use crate::config::ENV_INTERACTIVE;
use crate::error::TuiError;
use crate::server::{OverlayRequest, Response, Server, ENV_TUI_ADDR, ENV_TUI_TOKEN};
use crate::ui::overlay::{calculate_modal_size, render_overlay};
use crate::ui::palette::ModalPalette;
use crate::ui::terminal::Screen;
use crate::ui::Viewport;

/// The writable side of a PTY as the session sees it.
pub trait PtyControl: Send {
    fn write_input(&mut self, data: &[u8]) -> Result<()>;
    fn resize(&mut self, cols: u16, rows: u16) -> Result<()>;
}

/// PTY master opened through `portable-pty`.
struct NativePty {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
}

impl PtyControl for NativePty {
    fn write_input(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).context("Failed to write to PTY")?;
        self.writer.flush().context("Failed to flush PTY writer")?;
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to resize PTY")
    }
}

#[derive(Debug, Clone)]
pub struct PtyOptions {
    pub title: String,
    /// Shown next to the title.
    pub command_name: String,
}

impl Default for PtyOptions {
    fn default() -> Self {
        Self {
            title: "Running Command".to_string(),
            command_name: String::new(),
        }
    }
}

/// A widget shown over the output, with the request it answers.
struct ActiveOverlay {
    /// Messages from commands of earlier widgets carry another value.
    generation: u64,
    kind: ComponentKind,
    widget: Widget,
    request: OverlayRequest,
}

/// State of one PTY session.
pub struct PtySession {
    options: PtyOptions,
    state: ExecutionState,
    content: String,
    viewport: Viewport,
    width: u16,
    height: u16,
    result: Option<InteractiveResult>,
    overlay: Option<ActiveOverlay>,
    generation: u64,
    palette: ModalPalette,
    pty: Box<dyn PtyControl>,
    quit: bool,
}

impl PtySession {
    pub fn new(options: PtyOptions, palette: ModalPalette, pty: Box<dyn PtyControl>) -> Self {
        Self {
            options,
            state: ExecutionState::Executing,
            content: String::new(),
            viewport: Viewport::default(),
            width: 0,
            height: 0,
            result: None,
            overlay: None,
            generation: 0,
            palette,
            pty,
            quit: false,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Everything received from the child so far, plus the completion
    /// summary once it exited.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Kind of the widget currently shown, if any.
    pub fn overlay_kind(&self) -> Option<ComponentKind> {
        self.overlay.as_ref().map(|o| o.kind)
    }

    /// End the session. A widget still on screen is answered as cancelled;
    /// without a completed child the result is [`InteractiveResult::interrupted`].
    pub fn into_result(mut self) -> InteractiveResult {
        self.cancel_overlay();
        self.result.unwrap_or_else(InteractiveResult::interrupted)
    }

    fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> Option<Command> {
        match self.state {
            ExecutionState::Completed => {
                if review_key(&mut self.viewport, &key) {
                    self.quit = true;
                }
                None
            }
            ExecutionState::ShowingOverlay => self.update_overlay(Msg::Key(key)),
            ExecutionState::Executing => {
                if is_force_quit(&key) {
                    tracing::debug!("force quit requested");
                    self.quit = true;
                } else if let Some(bytes) = key_to_bytes(&key) {
                    if let Err(e) = self.pty.write_input(&bytes) {
                        tracing::debug!(error = %e, "dropping key");
                    }
                }
                None
            }
        }
    }

    fn handle_resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let rows = viewport_height(height);
        self.viewport.set_size(width, rows);

        if let Some(active) = self.overlay.as_mut() {
            let size = calculate_modal_size(active.kind, width, height);
            active.widget.set_size(size.width, size.height);
        }
        if self.state != ExecutionState::Completed {
            if let Err(e) = self.pty.resize(width, rows) {
                tracing::debug!(error = %e, "PTY resize failed");
            }
        }
    }

    fn handle_output(&mut self, text: &str) {
        self.content.push_str(text);
        self.viewport.set_content(&self.content);
        if self.state == ExecutionState::Executing {
            self.viewport.goto_bottom();
        }
    }

    fn handle_exit(&mut self, result: InteractiveResult) {
        tracing::debug!(exit_code = result.exit_code, error = ?result.error, "child exited");
        self.cancel_overlay();
        self.content.push_str(&completion_summary(&result));
        self.result = Some(result);
        self.state = ExecutionState::Completed;
        self.viewport.set_content(&self.content);
        self.viewport.goto_bottom();
    }

    fn open_overlay(&mut self, mut request: OverlayRequest) -> Option<Command> {
        match self.state {
            ExecutionState::Completed => {
                request.reply(Response::error("command has already finished"));
                return None;
            }
            ExecutionState::ShowingOverlay => {
                request.reply(Response::error("another component is active"));
                return None;
            }
            ExecutionState::Executing => {}
        }

        let options = std::mem::take(&mut request.options);
        let built = request.component.parse::<ComponentKind>().and_then(|kind| {
            let size = calculate_modal_size(kind, self.width, self.height);
            create(kind, options, size.width, size.height, &self.palette).map(|w| (kind, w))
        });
        let (kind, mut widget) = match built {
            Ok(built) => built,
            Err(e) => {
                tracing::debug!(component = %request.component, error = %e, "rejecting overlay request");
                request.reply(Response::error(format!("failed to create component: {}", e)));
                return None;
            }
        };

        self.generation += 1;
        tracing::debug!(component = %kind, generation = self.generation, "overlay opened");
        let command = widget.init();
        self.overlay = Some(ActiveOverlay {
            generation: self.generation,
            kind,
            widget,
            request,
        });
        self.state = ExecutionState::ShowingOverlay;

        if self.overlay_done() {
            self.close_overlay();
            return None;
        }
        command
    }

    fn update_overlay(&mut self, msg: Msg) -> Option<Command> {
        let command = self.overlay.as_mut()?.widget.update(msg);
        if self.overlay_done() {
            self.close_overlay();
            return None;
        }
        command
    }

    fn overlay_done(&self) -> bool {
        self.overlay.as_ref().is_some_and(|o| o.widget.is_done())
    }

    /// Answer the requester with the finished widget's result and go back
    /// to forwarding keys.
    fn close_overlay(&mut self) {
        let Some(active) = self.overlay.take() else {
            return;
        };
        let response = if active.widget.is_cancelled() {
            Response::cancelled()
        } else {
            match active.widget.result() {
                Ok(value) => Response::result(wire_result(active.kind, &value)),
                Err(e) => Response::error(e.to_string()),
            }
        };
        tracing::debug!(component = %active.kind, cancelled = response.cancelled, "overlay closed");
        active.request.reply(response);
        self.state = ExecutionState::Executing;
    }

    fn cancel_overlay(&mut self) {
        if let Some(active) = self.overlay.take() {
            tracing::debug!(component = %active.kind, "overlay abandoned");
            active.request.reply(Response::cancelled());
        }
    }
}

impl Session for PtySession {
    fn handle(&mut self, event: BridgeEvent) -> Option<Command> {
        match event {
            BridgeEvent::Key(key) => return self.handle_key(key),
            BridgeEvent::Resize(w, h) => self.handle_resize(w, h),
            BridgeEvent::Output(text) => self.handle_output(&text),
            BridgeEvent::Exited(result) => self.handle_exit(result),
            BridgeEvent::Overlay(request) => return self.open_overlay(request),
            BridgeEvent::Component(generation, msg) => {
                if self
                    .overlay
                    .as_ref()
                    .is_some_and(|o| o.generation == generation)
                {
                    return self.update_overlay(msg);
                }
                tracing::debug!(generation, "dropping message of a closed widget");
            }
        }
        None
    }

    fn view(&self) -> String {
        if self.width == 0 || self.height == 0 {
            return "Initializing...".to_string();
        }
        let base = Chrome {
            title: &self.options.title,
            command_name: &self.options.command_name,
            width: self.width,
            result: self.result.as_ref(),
        }
        .render(&self.viewport);

        match &self.overlay {
            Some(active) => render_overlay(
                &base,
                &active.widget.view(),
                self.width as usize,
                self.height as usize,
                &self.palette,
            ),
            None => base,
        }
    }

    fn is_finished(&self) -> bool {
        self.quit
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

/// Run `argv` in a PTY on the whole terminal until the user leaves the
/// review screen or force-quits.
///
/// The child sees `TUIBRIDGE_INTERACTIVE=1` and the address and token of a
/// control server it can ask for widgets.
pub fn run(argv: &[String], options: PtyOptions, palette: ModalPalette) -> Result<InteractiveResult> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TuiError::ProcessStart("no command given".to_string()))?;

    let (cols, rows) = Screen::size().unwrap_or((80, 24));
    let pty_system = NativePtySystem::default();
    let pty_pair = pty_system
        .openpty(PtySize {
            rows: viewport_height(rows),
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| TuiError::PtyAllocation(format!("{:#}", e)))
        .context("Failed to open PTY")?;

    let (tx, rx) = mpsc::channel();
    let mut server = Server::new()?;
    server.start(tx.clone(), BridgeEvent::Overlay)?;

    let mut cmd = CommandBuilder::new(program);
    for arg in args {
        cmd.arg(arg);
    }
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }
    cmd.env(ENV_INTERACTIVE, "1");
    cmd.env(ENV_TUI_ADDR, server.url());
    cmd.env(ENV_TUI_TOKEN, server.token());

    let started = Instant::now();
    let child = pty_pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| TuiError::ProcessStart(format!("{}: {:#}", program, e)))
        .context("Failed to spawn command in PTY")?;
    tracing::debug!(program = %program, pid = ?child.process_id(), "child started");

    // Drop the slave side so reads end once the child exits
    drop(pty_pair.slave);

    let reader = pty_pair
        .master
        .try_clone_reader()
        .context("Failed to clone PTY reader")?;
    let writer = pty_pair
        .master
        .take_writer()
        .context("Failed to take PTY writer")?;
    let mut killer = child.clone_killer();

    let (drained_tx, drained_rx) = mpsc::channel();
    spawn_reader(reader, tx.clone(), drained_tx);
    spawn_waiter(child, started, tx.clone(), drained_rx);

    let mut session = PtySession::new(
        options,
        palette,
        Box::new(NativePty {
            master: pty_pair.master,
            writer,
        }),
    );
    let outcome = run_on_screen(&mut session, &tx, &rx);

    let completed = session.state() == ExecutionState::Completed;
    let result = session.into_result();
    if !completed {
        if let Err(e) = killer.kill() {
            tracing::debug!(error = %e, "child already gone");
        }
    }
    server.stop();
    outcome?;
    Ok(result)
}

/// Wait for the child, give the reader a moment to flush, then report.
fn spawn_waiter(
    mut child: Box<dyn portable_pty::Child + Send + Sync>,
    started: Instant,
    tx: Sender<BridgeEvent>,
    drained: mpsc::Receiver<()>,
) {
    std::thread::spawn(move || {
        let result = match child.wait() {
            Ok(status) => {
                let code: i32 = status.exit_code().try_into().unwrap_or(1);
                InteractiveResult::exited(code, started.elapsed())
            }
            Err(e) => InteractiveResult::failed(e.to_string(), started.elapsed()),
        };
        let _ = drained.recv_timeout(DRAIN_TIMEOUT);
        let _ = tx.send(BridgeEvent::Exited(result));
    });
}
