//! Execution bridge tests
//!
//! Sessions are driven with synthetic events; the control channel runs a
//! real server on the loopback interface.

use tuibridge::ansi::strip;
use tuibridge::bridge::pipe::{PipeOptions, PipeSession};
use tuibridge::bridge::pty::{PtyControl, PtyOptions, PtySession};
use tuibridge::bridge::{drive, BridgeEvent, ExecutionState, InteractiveResult, Session};
use tuibridge::component::ComponentKind;
use tuibridge::server::{Client, Server};
use tuibridge::ui::ModalPalette;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::json;
use std::io::Write;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct RecordingPty {
    input: Arc<Mutex<Vec<u8>>>,
}

impl PtyControl for RecordingPty {
    fn write_input(&mut self, data: &[u8]) -> Result<()> {
        self.input.lock().expect("lock").extend_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, _cols: u16, _rows: u16) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn pty_session() -> (PtySession, RecordingPty) {
    let pty = RecordingPty::default();
    let palette = ModalPalette::new("#1a1a2e", "#7C3AED", "#7C3AED").expect("palette");
    let mut session = PtySession::new(PtyOptions::default(), palette, Box::new(pty.clone()));
    session.handle(BridgeEvent::Resize(80, 24));
    (session, pty)
}

fn key(code: KeyCode) -> BridgeEvent {
    BridgeEvent::Key(KeyEvent::new(code, KeyModifiers::empty()))
}

fn next_event(rx: &Receiver<BridgeEvent>) -> BridgeEvent {
    rx.recv_timeout(WAIT).expect("bridge event")
}

#[test]
fn test_confirm_round_trip_through_server() {
    let (mut session, pty) = pty_session();
    let (tx, rx) = mpsc::channel();
    let mut server = Server::new().expect("bind");
    server.start(tx, BridgeEvent::Overlay).expect("start");

    let client = Client::new(server.url(), server.token());
    assert!(client.is_available());
    let requester = thread::spawn(move || client.show("confirm", json!({"title": "Proceed?"})));

    let event = next_event(&rx);
    assert!(matches!(event, BridgeEvent::Overlay(_)));
    session.handle(event);
    assert_eq!(session.state(), ExecutionState::ShowingOverlay);
    assert_eq!(session.overlay_kind(), Some(ComponentKind::Confirm));
    assert!(strip(&session.view()).contains("Proceed?"));

    session.handle(key(KeyCode::Char('y')));
    let answer = requester.join().expect("join").expect("response");
    assert_eq!(answer, json!({"confirmed": true}));
    assert_eq!(session.state(), ExecutionState::Executing);
    assert!(pty.input.lock().expect("lock").is_empty());

    server.stop();
}

#[test]
fn test_cancelled_widget_reaches_client_as_cancellation() {
    let (mut session, _pty) = pty_session();
    let (tx, rx) = mpsc::channel();
    let mut server = Server::new().expect("bind");
    server.start(tx, BridgeEvent::Overlay).expect("start");

    let client = Client::new(server.url(), server.token());
    let requester = thread::spawn(move || {
        client.request("choose", json!({"options": ["red", "green"]}))
    });

    session.handle(next_event(&rx));
    session.handle(key(KeyCode::Esc));

    let response = requester.join().expect("join").expect("response");
    assert!(response.cancelled);
    assert!(response.result.is_none());
}

#[test]
fn test_unknown_component_is_reported_to_client() {
    let (mut session, _pty) = pty_session();
    let (tx, rx) = mpsc::channel();
    let mut server = Server::new().expect("bind");
    server.start(tx, BridgeEvent::Overlay).expect("start");

    let client = Client::new(server.url(), server.token());
    let requester = thread::spawn(move || client.request("slider", json!({})));

    session.handle(next_event(&rx));
    assert_eq!(session.state(), ExecutionState::Executing);

    let err = requester.join().expect("join").expect_err("should fail");
    assert!(err.to_string().contains("unknown component type: slider"));
}

#[test]
fn test_wrong_token_is_rejected() {
    let (tx, _rx) = mpsc::channel();
    let mut server = Server::new().expect("bind");
    server.start(tx, BridgeEvent::Overlay).expect("start");

    let client = Client::new(server.url(), "not-the-token");
    let err = client
        .request("confirm", json!({}))
        .expect_err("should be rejected");
    assert!(format!("{:#}", err).contains("401"));
}

#[test]
fn test_bad_method_and_body() {
    let (tx, _rx) = mpsc::channel();
    let mut server = Server::new().expect("bind");
    server.start(tx, BridgeEvent::Overlay).expect("start");
    let url = format!("{}/tui", server.url());

    match ureq::get(&url).call() {
        Err(ureq::Error::Status(code, _)) => assert_eq!(code, 405),
        other => panic!("expected 405, got {:?}", other.map(|r| r.status())),
    }

    let reply = ureq::post(&url)
        .set("Authorization", &format!("Bearer {}", server.token()))
        .send_string("{not json");
    match reply {
        Err(ureq::Error::Status(code, resp)) => {
            assert_eq!(code, 400);
            let body = resp.into_string().expect("body");
            assert!(body.contains("invalid JSON"));
        }
        other => panic!("expected 400, got {:?}", other.map(|r| r.status())),
    }

    match ureq::get(&format!("{}/nowhere", server.url())).call() {
        Err(ureq::Error::Status(code, _)) => assert_eq!(code, 404),
        other => panic!("expected 404, got {:?}", other.map(|r| r.status())),
    }
}

#[test]
fn test_stop_fails_waiting_request() {
    let (tx, rx) = mpsc::channel();
    let mut server = Server::new().expect("bind");
    server.start(tx, BridgeEvent::Overlay).expect("start");

    let client = Client::new(server.url(), server.token());
    let requester = thread::spawn(move || client.request("input", json!({})));

    // Hold the request without answering it.
    let _pending = next_event(&rx);
    server.stop();

    let err = requester.join().expect("join").expect_err("should fail");
    assert!(format!("{:#}", err).contains("503"));
}

#[test]
fn test_pty_session_runs_to_completion_in_loop() {
    let (mut session, pty) = pty_session();
    let (tx, rx) = mpsc::channel();

    tx.send(BridgeEvent::Output("Building...\n".into())).expect("send");
    tx.send(key(KeyCode::Char('n'))).expect("send");
    tx.send(BridgeEvent::Exited(InteractiveResult::exited(
        0,
        Duration::from_millis(1500),
    )))
    .expect("send");
    tx.send(key(KeyCode::Char('q'))).expect("send");

    let mut last = String::new();
    drive(&mut session, (80, 24), &tx, &rx, |frame| {
        last = frame.to_string();
        Ok(())
    })
    .expect("drive");

    assert!(session.is_finished());
    assert_eq!(*pty.input.lock().expect("lock"), b"n".to_vec());
    let shown = strip(&last);
    assert!(shown.contains("Building..."));
    assert!(shown.contains("COMPLETED SUCCESSFULLY"));
    assert!(shown.contains("Done"));

    let result = session.into_result();
    assert!(result.is_success());
    assert_eq!(result.duration, Duration::from_millis(1500));
}

#[test]
fn test_pipe_session_echo_and_completion_in_loop() {
    let stdin = SharedBuf::default();
    let mut session = PipeSession::new(PipeOptions::default(), Box::new(stdin.clone()));
    let transcript = session.transcript();
    let (tx, rx) = mpsc::channel();

    tx.send(BridgeEvent::Output("Name? ".into())).expect("send");
    for c in "Ada".chars() {
        tx.send(key(KeyCode::Char(c))).expect("send");
    }
    tx.send(key(KeyCode::Enter)).expect("send");
    tx.send(BridgeEvent::Output("Hello, Ada\n".into())).expect("send");
    tx.send(BridgeEvent::Exited(InteractiveResult::exited(
        2,
        Duration::from_millis(10),
    )))
    .expect("send");
    tx.send(key(KeyCode::Enter)).expect("send");

    let mut last = String::new();
    drive(&mut session, (60, 12), &tx, &rx, |frame| {
        last = frame.to_string();
        Ok(())
    })
    .expect("drive");

    assert_eq!(*stdin.0.lock().expect("lock"), b"Ada\n".to_vec());
    let content = strip(&transcript.content());
    assert!(content.starts_with("Name? Ada\nHello, Ada\n"));
    assert!(content.contains("EXITED WITH CODE 2"));
    assert!(strip(&last).contains("Failed"));
    assert!(session.stdin_closed());
    assert_eq!(session.into_result().exit_code, 2);
}
