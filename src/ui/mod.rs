//! # UI Module
//!
//! Terminal-facing building blocks shared by the widgets and the execution
//! bridges.
//!
//! ## Components
//!
//! - [`palette`] - widget colors and the modal palette
//! - [`mod@render`] - ratatui buffer to ANSI text
//! - [`overlay`] - framing, centering and compositing of modal dialogs
//! - [`viewport`] - scrollback window
//! - [`terminal`] - raw mode, alternate screen, input thread
//!
//! ## Frame layout of an execution session
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │ Title  command                                  │  header (2 rows)
//! │ ─────────────────────────────────────────────── │
//! │                                                 │
//! │   scrollback viewport     ╭──────────────╮      │
//! │                           │    modal     │      │
//! │                           ╰──────────────╯      │
//! │                                                 │
//! │ Running...  |  Ctrl+\: force quit          42%  │  footer (1 row)
//! └─────────────────────────────────────────────────┘
//! ```

pub mod overlay;
pub mod palette;
pub mod render;
pub mod terminal;
pub mod viewport;

pub use overlay::{calculate_modal_size, render_overlay, ModalSize};
pub use palette::{ModalPalette, Palette};
pub use viewport::Viewport;
