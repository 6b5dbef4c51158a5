//! Full-screen runner for a single component.
//!
//! The loop owns the component; the input thread and any [`Command`]s the
//! component returns feed it through one channel. The loop ends once the
//! component reports done or every sender is gone.

use anyhow::Result;
use crossterm::event::Event;
use std::sync::mpsc::{self, Receiver, Sender};

use super::{Command, Component, ComponentValue, Msg};
use crate::config::OutputStream;
use crate::error::TuiError;
use crate::ui::terminal::{CrosstermEventReader, EventReader, InputThread, Screen};

/// Everything the runner loop reacts to.
#[derive(Debug)]
pub enum RunnerEvent {
    Input(Event),
    Component(Msg),
}

/// Run `component` on the whole terminal and return its result.
///
/// Cancellation comes back as an error wrapping [`TuiError::Cancelled`].
pub fn run<C: Component>(component: C, stream: OutputStream) -> Result<ComponentValue> {
    run_with_reader(component, stream, Box::new(CrosstermEventReader))
}

pub fn run_with_reader<C: Component>(
    mut component: C,
    stream: OutputStream,
    reader: Box<dyn EventReader>,
) -> Result<ComponentValue> {
    let mut screen = Screen::enter(stream)?;
    let size = Screen::size()?;
    let (tx, rx) = mpsc::channel();
    let input = InputThread::spawn(reader, tx.clone(), |event| {
        Some(RunnerEvent::Input(event))
    });

    let outcome = drive(&mut component, size, &tx, &rx, |frame| screen.draw(frame));

    input.stop();
    screen.restore()?;
    Ok(outcome??)
}

fn spawn(command: Command, tx: &Sender<RunnerEvent>) {
    command.spawn(tx, RunnerEvent::Component);
}

/// The runner loop without the terminal: sizes and starts the component,
/// draws after every event, and stops when the component is done.
pub fn drive<C, D>(
    component: &mut C,
    (width, height): (u16, u16),
    tx: &Sender<RunnerEvent>,
    rx: &Receiver<RunnerEvent>,
    mut draw: D,
) -> Result<Result<ComponentValue, TuiError>>
where
    C: Component,
    D: FnMut(&str) -> Result<()>,
{
    component.set_size(width, height);
    if let Some(command) = component.init() {
        spawn(command, tx);
    }

    loop {
        draw(&component.view())?;
        if component.is_done() {
            break;
        }
        let msg = match rx.recv() {
            Ok(RunnerEvent::Input(Event::Key(key))) => Msg::Key(key),
            Ok(RunnerEvent::Input(Event::Resize(w, h))) => {
                component.set_size(w, h);
                continue;
            }
            Ok(RunnerEvent::Input(_)) => continue,
            Ok(RunnerEvent::Component(msg)) => msg,
            Err(_) => {
                tracing::debug!("runner channel closed before the component finished");
                break;
            }
        };
        if let Some(command) = component.update(msg) {
            spawn(command, tx);
        }
    }

    if component.is_done() {
        Ok(component.result())
    } else {
        Ok(Err(TuiError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::strip;
    use crate::component::{InputModel, InputOptions, SpinModel, SpinOptions};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> RunnerEvent {
        RunnerEvent::Input(Event::Key(KeyEvent::new(code, KeyModifiers::empty())))
    }

    #[test]
    fn test_drive_input_to_completion() {
        let (tx, rx) = mpsc::channel();
        for event in [key(KeyCode::Char('h')), key(KeyCode::Char('i')), key(KeyCode::Enter)] {
            tx.send(event).expect("send");
        }
        let mut model = InputModel::new(InputOptions::default());
        let mut frames = Vec::new();
        let result = drive(&mut model, (20, 4), &tx, &rx, |frame| {
            frames.push(strip(frame));
            Ok(())
        })
        .expect("drive");

        assert_eq!(result.ok(), Some(ComponentValue::Text("hi".into())));
        assert!(frames[2].contains("> hi"));
        assert_eq!(frames.last().map(String::as_str), Some(""));
    }

    #[test]
    fn test_resize_reaches_component() {
        let (tx, rx) = mpsc::channel();
        tx.send(RunnerEvent::Input(Event::Resize(12, 3))).expect("send");
        tx.send(key(KeyCode::Esc)).expect("send");
        let mut model = InputModel::new(InputOptions::default());
        let mut widths = Vec::new();
        let result = drive(&mut model, (30, 4), &tx, &rx, |frame| {
            widths.push(frame.lines().next().map(|l| strip(l).chars().count()));
            Ok(())
        })
        .expect("drive");

        assert!(matches!(result, Err(TuiError::Cancelled)));
        assert_eq!(widths[0], Some(30));
        assert_eq!(widths[1], Some(12));
    }

    #[test]
    fn test_closed_channel_counts_as_cancel() {
        let (tx, _commands) = mpsc::channel();
        let (closed, rx) = mpsc::channel::<RunnerEvent>();
        drop(closed);
        let mut model = InputModel::new(InputOptions::default());
        let result = drive(&mut model, (20, 4), &tx, &rx, |_| Ok(())).expect("drive");
        assert!(matches!(result, Err(TuiError::Cancelled)));
    }

    #[cfg(unix)]
    #[test]
    fn test_drive_runs_spinner_command() {
        let (tx, rx) = mpsc::channel();
        let mut model = SpinModel::new(SpinOptions {
            title: "wait".into(),
            command: vec!["sh".into(), "-c".into(), "printf done".into()],
            ..SpinOptions::default()
        });
        let result = drive(&mut model, (20, 1), &tx, &rx, |_| Ok(())).expect("drive");
        match result {
            Ok(ComponentValue::Spin(out)) => {
                assert_eq!(out.stdout, "done");
                assert_eq!(out.exit_code, 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
