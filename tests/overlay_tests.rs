//! Overlay compositing as a real terminal would display it
//!
//! Frames are fed through a vt100 parser and checked cell by cell.

use tuibridge::ansi::visible_width;
use tuibridge::bridge::pty::{PtyControl, PtyOptions, PtySession};
use tuibridge::bridge::{BridgeEvent, Session};
use tuibridge::ui::{render_overlay, ModalPalette};

use anyhow::Result;
use serde_json::json;
use std::sync::mpsc;

fn palette() -> ModalPalette {
    ModalPalette::new("#1a1a2e", "#7C3AED", "#7C3AED").expect("palette")
}

/// Parse `frame` on a `cols` x `rows` terminal.
fn screen(frame: &str, cols: u16, rows: u16) -> vt100::Parser {
    let mut parser = vt100::Parser::new(rows, cols, 0);
    parser.process(frame.replace('\n', "\r\n").as_bytes());
    parser
}

fn cell_text(parser: &vt100::Parser, row: u16, col: u16) -> String {
    parser
        .screen()
        .cell(row, col)
        .map(|c| c.contents().to_string())
        .unwrap_or_default()
}

fn base_frame(rows: usize) -> String {
    (0..rows)
        .map(|_| "\x1b[31mabcdefghijklmnopqrstuvwxyz0123\x1b[0m".to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_modal_is_centered_and_framed() {
    let frame = render_overlay(&base_frame(10), "Hello", 30, 10, &palette());
    for line in frame.split('\n') {
        assert_eq!(visible_width(line), 30);
    }

    // Framed block is 11x5: border, 2 columns / 1 row of padding, content.
    let parser = screen(&frame, 30, 10);
    assert_eq!(cell_text(&parser, 2, 9), "╭");
    assert_eq!(cell_text(&parser, 2, 19), "╮");
    assert_eq!(cell_text(&parser, 4, 9), "│");
    assert_eq!(cell_text(&parser, 4, 12), "H");
    assert_eq!(cell_text(&parser, 6, 9), "╰");
}

#[test]
fn test_base_text_survives_around_modal() {
    let frame = render_overlay(&base_frame(10), "Hello", 30, 10, &palette());
    let parser = screen(&frame, 30, 10);

    assert_eq!(cell_text(&parser, 0, 0), "a");
    assert_eq!(cell_text(&parser, 4, 8), "i");
    assert_eq!(cell_text(&parser, 4, 20), "u");
    assert_eq!(cell_text(&parser, 9, 29), "3");

    let untouched = parser.screen().cell(0, 5).expect("cell");
    assert_eq!(untouched.fgcolor(), vt100::Color::Idx(1));
}

#[test]
fn test_modal_background_is_painted() {
    let frame = render_overlay(&base_frame(10), "Hello", 30, 10, &palette());
    let parser = screen(&frame, 30, 10);

    for col in 10..19 {
        let cell = parser.screen().cell(4, col).expect("cell");
        assert_eq!(
            cell.bgcolor(),
            vt100::Color::Rgb(0x1a, 0x1a, 0x2e),
            "column {} should use the modal background",
            col
        );
    }
    let outside = parser.screen().cell(4, 25).expect("cell");
    assert_eq!(outside.bgcolor(), vt100::Color::Default);
}

#[test]
fn test_content_reset_does_not_leak_terminal_background() {
    let frame = render_overlay(&base_frame(10), "\x1b[1mHi\x1b[0m there", 30, 10, &palette());
    let parser = screen(&frame, 30, 10);

    // The cell right after the reset inside the content is still modal.
    let row = 4;
    let start = (0..30)
        .find(|&c| cell_text(&parser, row, c) == "H")
        .expect("content start");
    let after_reset = parser.screen().cell(row, start + 2).expect("cell");
    assert_eq!(after_reset.bgcolor(), vt100::Color::Rgb(0x1a, 0x1a, 0x2e));
}

struct NullPty;

impl PtyControl for NullPty {
    fn write_input(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn resize(&mut self, _cols: u16, _rows: u16) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_session_frame_with_confirm_modal() {
    let mut session = PtySession::new(
        PtyOptions {
            title: "Deploying".into(),
            command_name: "./deploy.sh".into(),
        },
        palette(),
        Box::new(NullPty),
    );
    session.handle(BridgeEvent::Resize(60, 20));
    for i in 0..30 {
        session.handle(BridgeEvent::Output(format!("step {}\n", i)));
    }

    let (tx, _rx) = mpsc::channel();
    session.handle(BridgeEvent::Overlay(tuibridge::server::OverlayRequest {
        component: "confirm".into(),
        options: json!({"title": "Ship it?"}),
        respond: tx,
    }));

    let parser = screen(&session.view(), 60, 20);
    let rows: Vec<String> = parser.screen().rows(0, 60).collect();
    assert_eq!(rows.len(), 20);
    assert!(rows[0].contains("Deploying"));
    assert!(rows[0].contains("./deploy.sh"));
    assert!(rows.iter().any(|r| r.contains("Ship it?")));
    assert!(rows.iter().any(|r| r.contains('╭')));
    // Output above the modal is still visible.
    assert!(rows.iter().any(|r| r.starts_with("step ")));
}
