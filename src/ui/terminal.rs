//! # Terminal Ownership
//!
//! Raw mode and the alternate screen, held by a [`Screen`] guard that
//! restores the terminal when dropped, plus the input thread that turns
//! crossterm events into messages for an event loop.
//!
//! Frames are drawn as pre-composited ANSI text, one line per row. The
//! screen can write to stdout or stderr so prompts stay out of
//! `$(command substitution)` when the caller asked for stderr.
//!
//! Events are read through the [`EventReader`] trait so loops can be driven
//! with scripted input in tests.

use anyhow::{Context, Result};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event},
    execute, queue,
    style::Print,
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::OutputStream;

/// How long the input thread blocks before re-checking its stop flag.
pub const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Trait for reading terminal events (allows dependency injection for testing)
pub trait EventReader: Send {
    fn read_event(&mut self, timeout: Duration) -> Result<Option<Event>>;
}

/// Production event reader that uses crossterm's event polling + read
pub struct CrosstermEventReader;

impl EventReader for CrosstermEventReader {
    fn read_event(&mut self, timeout: Duration) -> Result<Option<Event>> {
        if event::poll(timeout).context("Failed to poll for events")? {
            Ok(Some(event::read().context("Failed to read keyboard event")?))
        } else {
            Ok(None)
        }
    }
}

/// Handle to a running input thread. Dropping it asks the thread to stop.
pub struct InputThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputThread {
    /// Read events from `reader` and forward every one `map` accepts to `tx`.
    /// The thread ends when stopped, when the receiver is gone, or when the
    /// reader fails.
    pub fn spawn<E, F>(mut reader: Box<dyn EventReader>, tx: Sender<E>, map: F) -> Self
    where
        E: Send + 'static,
        F: Fn(Event) -> Option<E> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                match reader.read_event(INPUT_POLL_INTERVAL) {
                    Ok(Some(event)) => {
                        if let Some(msg) = map(event) {
                            if tx.send(msg).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "input reader stopped");
                        break;
                    }
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InputThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Raw mode + alternate screen on stdout or stderr, restored on drop.
pub struct Screen {
    out: Box<dyn Write + Send>,
    active: bool,
}

impl Screen {
    /// Take over the terminal.
    pub fn enter(stream: OutputStream) -> Result<Self> {
        let out: Box<dyn Write + Send> = match stream {
            OutputStream::Stdout => Box::new(io::stdout()),
            OutputStream::Stderr => Box::new(io::stderr()),
        };
        Self::enter_with(out)
    }

    fn enter_with(mut out: Box<dyn Write + Send>) -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode for terminal")?;
        if let Err(e) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(e).context("Failed to setup terminal");
        }
        Ok(Self { out, active: true })
    }

    /// Current terminal size as (columns, rows).
    pub fn size() -> Result<(u16, u16)> {
        crossterm::terminal::size().context("Failed to query terminal size")
    }

    /// Paint a full frame, one line per row from the top-left corner.
    pub fn draw(&mut self, frame: &str) -> Result<()> {
        write_frame(&mut self.out, frame)
    }

    /// Restore the terminal. Called automatically on drop.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(self.out, LeaveAlternateScreen, Show).context("Failed to restore terminal")?;
        disable_raw_mode().context("Failed to disable raw mode")?;
        Ok(())
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Queue the commands that paint `frame` onto `out`, then flush.
pub fn write_frame<W: Write>(out: &mut W, frame: &str) -> Result<()> {
    for (row, line) in frame.split('\n').enumerate() {
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        queue!(out, MoveTo(0, row), Print(line), Clear(ClearType::UntilNewLine))
            .context("Failed to queue frame line")?;
    }
    queue!(out, Clear(ClearType::FromCursorDown)).context("Failed to queue frame clear")?;
    out.flush().context("Failed to flush frame")?;
    Ok(())
}

/// Restore the terminal before the default panic output is printed.
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
        let _ = execute!(io::stderr(), LeaveAlternateScreen, Show);
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::collections::VecDeque;
    use std::sync::mpsc;

    struct MockEventReader {
        events: VecDeque<Event>,
    }

    impl EventReader for MockEventReader {
        fn read_event(&mut self, _timeout: Duration) -> Result<Option<Event>> {
            match self.events.pop_front() {
                Some(e) => Ok(Some(e)),
                None => anyhow::bail!("script exhausted"),
            }
        }
    }

    fn key_event(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::empty()))
    }

    #[test]
    fn test_input_thread_forwards_mapped_events() {
        let reader = MockEventReader {
            events: VecDeque::from(vec![
                key_event(KeyCode::Char('a')),
                Event::FocusGained,
                key_event(KeyCode::Enter),
            ]),
        };
        let (tx, rx) = mpsc::channel();
        let input = InputThread::spawn(Box::new(reader), tx, |event| match event {
            Event::Key(key) => Some(key.code),
            _ => None,
        });

        assert_eq!(rx.recv().expect("first"), KeyCode::Char('a'));
        assert_eq!(rx.recv().expect("second"), KeyCode::Enter);
        input.stop();
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_write_frame_positions_each_line() {
        let mut out: Vec<u8> = Vec::new();
        write_frame(&mut out, "ab\ncd").expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("\x1b[1;1Hab"));
        assert!(text.contains("\x1b[2;1Hcd"));
    }
}
