//! tuibridge - modal TUI widgets over the live output of a running command
//!
//! A command runs inside a pseudo-terminal (or behind plain pipes) while its
//! output scrolls in a viewport. The command, or anything it launches, can
//! ask the session for a widget (confirm, choose, input, ...) which is drawn
//! as a modal on top of that output. The answer travels back as JSON.

pub mod ansi;
pub mod bridge;
pub mod component;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod ui;
