//! # Embeddable Components
//!
//! Every widget implements [`Component`], a small message-driven protocol
//! that lets the same widget run full-screen on its own or be driven by a
//! parent loop (an execution bridge) that draws it as a modal overlay.
//!
//! ## Protocol
//!
//! ```text
//!  set_size(w, h) ─► init() ─► update(Msg) ... ─► is_done() ─► result()
//!                       │           │
//!                       └───────────┴──► Option<Command>  (run by the owner)
//! ```
//!
//! - `update` never blocks. Slow work (the spinner's command) is returned as
//!   a [`Command`]; the owner runs it on a thread and feeds its [`Msg`] back.
//! - `view` renders at most `width` columns and returns an empty string once
//!   the widget is done.
//! - `is_cancelled` implies `is_done`, and `result` then fails with
//!   [`TuiError::Cancelled`].
//!
//! ## Kinds
//!
//! The set of widgets is closed: [`ComponentKind`] names them and [`Widget`]
//! dispatches to them. [`create`] builds a modal widget from a kind and a
//! JSON options object with snake_case field names.

pub mod accessible;
pub mod choose;
pub mod confirm;
pub mod file;
pub mod filter;
pub mod fuzzy;
pub mod input;
pub mod pager;
pub mod spin;
pub mod standalone;
pub mod table;
pub mod write;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget as _};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::error::TuiError;
use crate::ui::palette::{ModalPalette, Palette};
use crate::ui::render;

pub use choose::{ChooseModel, ChooseOptions};
pub use confirm::{ConfirmModel, ConfirmOptions};
pub use file::{FileModel, FileOptions};
pub use filter::{FilterModel, FilterOptions};
pub use input::{InputModel, InputOptions};
pub use pager::{PagerModel, PagerOptions};
pub use spin::{SpinModel, SpinOptions, SpinOutput};
pub use table::{TableModel, TableOptions, TableSelection};
pub use write::{WriteModel, WriteOptions};

/// Event delivered to a component.
#[derive(Debug, Clone)]
pub enum Msg {
    Key(KeyEvent),
    /// Animation tick requested through [`Command::Tick`].
    Tick,
    /// The spinner's command finished.
    SpinFinished(SpinOutput),
}

/// Side effect requested by a component, executed by whoever owns it.
pub enum Command {
    /// Deliver [`Msg::Tick`] after the delay.
    Tick(Duration),
    /// Run on a background thread and deliver the returned message.
    Run(Box<dyn FnOnce() -> Msg + Send>),
    /// Several independent commands.
    Batch(Vec<Command>),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Tick(delay) => f.debug_tuple("Tick").field(delay).finish(),
            Command::Run(_) => f.write_str("Run(..)"),
            Command::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
        }
    }
}

impl Command {
    /// Execute on background threads, sending each resulting message through
    /// `tx` after wrapping it with `wrap`.
    pub fn spawn<E, F>(self, tx: &Sender<E>, wrap: F)
    where
        E: Send + 'static,
        F: Fn(Msg) -> E + Clone + Send + 'static,
    {
        let work: Box<dyn FnOnce() -> Msg + Send> = match self {
            Command::Batch(cmds) => {
                for cmd in cmds {
                    cmd.spawn(tx, wrap.clone());
                }
                return;
            }
            Command::Tick(delay) => Box::new(move || {
                std::thread::sleep(delay);
                Msg::Tick
            }),
            Command::Run(work) => work,
        };
        let tx = tx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(wrap(work()));
        });
    }
}

/// The capability set shared by every widget.
pub trait Component {
    /// First side effect, if any. Called once, after the first `set_size`.
    fn init(&mut self) -> Option<Command> {
        None
    }

    fn update(&mut self, msg: Msg) -> Option<Command>;

    /// Styled text, at most `width` columns wide. Empty once done.
    fn view(&self) -> String;

    fn is_done(&self) -> bool;

    /// True only when dismissed with Esc or Ctrl+C.
    fn is_cancelled(&self) -> bool;

    fn result(&self) -> Result<ComponentValue, TuiError>;

    fn set_size(&mut self, width: u16, height: u16);
}

/// Typed result of a finished component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    /// input, write, file
    Text(String),
    /// confirm
    Bool(bool),
    /// choose, filter
    List(Vec<String>),
    /// table
    TableRow(TableSelection),
    /// spin
    Spin(SpinOutput),
    /// pager
    None,
}

/// The closed set of widget kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Input,
    Confirm,
    Choose,
    Filter,
    File,
    /// Multi-line editor; also requested as `textarea`.
    Write,
    Spin,
    Pager,
    Table,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 9] = [
        ComponentKind::Input,
        ComponentKind::Confirm,
        ComponentKind::Choose,
        ComponentKind::Filter,
        ComponentKind::File,
        ComponentKind::Write,
        ComponentKind::Spin,
        ComponentKind::Pager,
        ComponentKind::Table,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Input => "input",
            ComponentKind::Confirm => "confirm",
            ComponentKind::Choose => "choose",
            ComponentKind::Filter => "filter",
            ComponentKind::File => "file",
            ComponentKind::Write => "write",
            ComponentKind::Spin => "spin",
            ComponentKind::Pager => "pager",
            ComponentKind::Table => "table",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = TuiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "textarea" => Ok(ComponentKind::Write),
            _ => ComponentKind::ALL
                .into_iter()
                .find(|k| k.as_str() == s)
                .ok_or_else(|| TuiError::UnknownComponent(s.to_string())),
        }
    }
}

/// A constructed widget of any kind.
#[derive(Debug)]
pub enum Widget {
    Input(InputModel),
    Confirm(ConfirmModel),
    Choose(ChooseModel),
    Filter(FilterModel),
    File(FileModel),
    Write(WriteModel),
    Spin(SpinModel),
    Pager(PagerModel),
    Table(TableModel),
}

macro_rules! dispatch {
    ($self:expr, $w:ident => $body:expr) => {
        match $self {
            Widget::Input($w) => $body,
            Widget::Confirm($w) => $body,
            Widget::Choose($w) => $body,
            Widget::Filter($w) => $body,
            Widget::File($w) => $body,
            Widget::Write($w) => $body,
            Widget::Spin($w) => $body,
            Widget::Pager($w) => $body,
            Widget::Table($w) => $body,
        }
    };
}

impl Widget {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Widget::Input(_) => ComponentKind::Input,
            Widget::Confirm(_) => ComponentKind::Confirm,
            Widget::Choose(_) => ComponentKind::Choose,
            Widget::Filter(_) => ComponentKind::Filter,
            Widget::File(_) => ComponentKind::File,
            Widget::Write(_) => ComponentKind::Write,
            Widget::Spin(_) => ComponentKind::Spin,
            Widget::Pager(_) => ComponentKind::Pager,
            Widget::Table(_) => ComponentKind::Table,
        }
    }
}

impl Component for Widget {
    fn init(&mut self) -> Option<Command> {
        dispatch!(self, w => w.init())
    }

    fn update(&mut self, msg: Msg) -> Option<Command> {
        dispatch!(self, w => w.update(msg))
    }

    fn view(&self) -> String {
        dispatch!(self, w => w.view())
    }

    fn is_done(&self) -> bool {
        dispatch!(self, w => w.is_done())
    }

    fn is_cancelled(&self) -> bool {
        dispatch!(self, w => w.is_cancelled())
    }

    fn result(&self) -> Result<ComponentValue, TuiError> {
        dispatch!(self, w => w.result())
    }

    fn set_size(&mut self, width: u16, height: u16) {
        dispatch!(self, w => w.set_size(width, height));
    }
}

pub(crate) fn parse_options<T: DeserializeOwned>(kind: ComponentKind, options: Value) -> Result<T, TuiError> {
    let options = if options.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        options
    };
    serde_json::from_value(options).map_err(|source| TuiError::InvalidOptions {
        kind: kind.to_string(),
        source,
    })
}

/// Build a modal widget of `kind` from wire options and size it.
pub fn create(
    kind: ComponentKind,
    options: Value,
    width: u16,
    height: u16,
    palette: &ModalPalette,
) -> Result<Widget, TuiError> {
    let mut widget = match kind {
        ComponentKind::Input => Widget::Input(InputModel::for_modal(
            parse_options(kind, options)?,
            palette,
        )),
        ComponentKind::Confirm => Widget::Confirm(ConfirmModel::for_modal(
            parse_options(kind, options)?,
            palette,
        )),
        ComponentKind::Choose => Widget::Choose(ChooseModel::for_modal(
            parse_options(kind, options)?,
            palette,
        )),
        ComponentKind::Filter => Widget::Filter(FilterModel::for_modal(
            parse_options(kind, options)?,
            palette,
        )),
        ComponentKind::File => Widget::File(FileModel::for_modal(
            parse_options(kind, options)?,
            palette,
        )),
        ComponentKind::Write => Widget::Write(WriteModel::for_modal(
            parse_options(kind, options)?,
            palette,
        )),
        ComponentKind::Spin => {
            Widget::Spin(SpinModel::for_modal(parse_options(kind, options)?, palette))
        }
        ComponentKind::Pager => Widget::Pager(PagerModel::for_modal(
            parse_options(kind, options)?,
            palette,
        )),
        ComponentKind::Table => Widget::Table(TableModel::for_modal(
            parse_options(kind, options)?,
            palette,
        )),
    };
    widget.set_size(width, height);
    Ok(widget)
}

/// Build a full-screen widget of `kind` with the standalone colors.
pub fn create_standalone(kind: ComponentKind, options: Value) -> Result<Widget, TuiError> {
    Ok(match kind {
        ComponentKind::Input => Widget::Input(InputModel::new(parse_options(kind, options)?)),
        ComponentKind::Confirm => Widget::Confirm(ConfirmModel::new(parse_options(kind, options)?)),
        ComponentKind::Choose => Widget::Choose(ChooseModel::new(parse_options(kind, options)?)),
        ComponentKind::Filter => Widget::Filter(FilterModel::new(parse_options(kind, options)?)),
        ComponentKind::File => Widget::File(FileModel::new(parse_options(kind, options)?)),
        ComponentKind::Write => Widget::Write(WriteModel::new(parse_options(kind, options)?)),
        ComponentKind::Spin => Widget::Spin(SpinModel::new(parse_options(kind, options)?)),
        ComponentKind::Pager => Widget::Pager(PagerModel::new(parse_options(kind, options)?)),
        ComponentKind::Table => Widget::Table(TableModel::new(parse_options(kind, options)?)),
    })
}

/// Wire results, one shape per kind.
#[derive(Debug, Serialize)]
struct SelectedResult<'a> {
    selected: &'a [String],
}

#[derive(Debug, Serialize)]
struct ConfirmResult {
    confirmed: bool,
}

#[derive(Debug, Serialize)]
struct ValueResult<'a> {
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct PathResult<'a> {
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct EmptyResult {}

/// Convert a typed result into the JSON shape expected for `kind`.
///
/// A value that does not fit the kind yields that kind's empty shape
/// (`selected_index: -1` for tables).
pub fn wire_result(kind: ComponentKind, value: &ComponentValue) -> Value {
    let json = match (kind, value) {
        (ComponentKind::Choose | ComponentKind::Filter, ComponentValue::List(items)) => {
            serde_json::to_value(SelectedResult { selected: items })
        }
        (ComponentKind::Choose | ComponentKind::Filter, _) => {
            serde_json::to_value(SelectedResult { selected: &[] })
        }
        (ComponentKind::Confirm, ComponentValue::Bool(b)) => {
            serde_json::to_value(ConfirmResult { confirmed: *b })
        }
        (ComponentKind::Confirm, _) => serde_json::to_value(ConfirmResult { confirmed: false }),
        (ComponentKind::Input | ComponentKind::Write, ComponentValue::Text(s)) => {
            serde_json::to_value(ValueResult { value: s })
        }
        (ComponentKind::Input | ComponentKind::Write, _) => {
            serde_json::to_value(ValueResult { value: "" })
        }
        (ComponentKind::File, ComponentValue::Text(s)) => {
            serde_json::to_value(PathResult { path: s })
        }
        (ComponentKind::File, _) => serde_json::to_value(PathResult { path: "" }),
        (ComponentKind::Table, ComponentValue::TableRow(sel)) => serde_json::to_value(sel),
        (ComponentKind::Table, _) => serde_json::to_value(TableSelection::none()),
        (ComponentKind::Spin, ComponentValue::Spin(out)) => serde_json::to_value(out),
        (ComponentKind::Spin, _) => serde_json::to_value(SpinOutput::default()),
        (ComponentKind::Pager, _) => serde_json::to_value(EmptyResult {}),
    };
    json.unwrap_or(Value::Null)
}

/// Draw `lines` into a block `width` columns wide, one row per line, on the
/// palette's background.
pub(crate) fn render_lines(lines: Vec<Line<'_>>, width: u16, palette: &Palette) -> String {
    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let base = Style::default().fg(palette.fg).bg(palette.bg);
    render::draw(width.max(1), height, |area, buf| {
        Paragraph::new(lines).style(base).render(area, buf);
    })
}

/// Title and description lines shared by every widget.
pub(crate) fn header_lines(title: &str, description: &str, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if !title.is_empty() {
        lines.push(Line::from(Span::styled(
            title.to_string(),
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )));
    }
    if !description.is_empty() {
        lines.push(Line::from(Span::styled(
            description.to_string(),
            Style::default().fg(palette.fg_dim),
        )));
    }
    lines
}

/// Dim one-line key hint.
pub(crate) fn hint_line(text: &str, palette: &Palette) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(palette.fg_dim),
    ))
}

/// Only key presses drive widgets; releases and repeats from terminals
/// with enhanced keyboard reporting are ignored.
pub(crate) fn key_press(msg: &Msg) -> Option<&KeyEvent> {
    match msg {
        Msg::Key(key) if key.kind == KeyEventKind::Press => Some(key),
        _ => None,
    }
}

/// Esc or Ctrl+C.
pub(crate) fn is_cancel_key(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Esc)
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

/// Shared done/cancelled bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Completion {
    done: bool,
    cancelled: bool,
}

impl Completion {
    pub(crate) fn submit(&mut self) {
        self.done = true;
    }

    pub(crate) fn cancel(&mut self) {
        self.done = true;
        self.cancelled = true;
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// `Err(Cancelled)` when cancelled, otherwise `value()`.
    pub(crate) fn result<F>(&self, value: F) -> Result<ComponentValue, TuiError>
    where
        F: FnOnce() -> ComponentValue,
    {
        if self.cancelled {
            Err(TuiError::Cancelled)
        } else {
            Ok(value())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;

    fn palette() -> ModalPalette {
        ModalPalette::new("#1a1a2e", "#7C3AED", "#7C3AED").expect("palette")
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("choose".parse::<ComponentKind>().ok(), Some(ComponentKind::Choose));
        assert_eq!("textarea".parse::<ComponentKind>().ok(), Some(ComponentKind::Write));
        assert_eq!("write".parse::<ComponentKind>().ok(), Some(ComponentKind::Write));
        let err = "slider".parse::<ComponentKind>().expect_err("unknown");
        assert_eq!(err.to_string(), "unknown component type: slider");
    }

    #[test]
    fn test_create_accepts_snake_case_options() {
        let widget = create(
            ComponentKind::Choose,
            json!({"title": "Pick", "options": ["a", "b", "c"], "no_limit": true}),
            40,
            10,
            &palette(),
        )
        .expect("create");
        let Widget::Choose(model) = widget else {
            panic!("expected choose widget");
        };
        assert!(model.is_multi());
    }

    #[test]
    fn test_create_rejects_malformed_options() {
        let err = create(
            ComponentKind::Confirm,
            json!({"default": "yes please"}),
            40,
            4,
            &palette(),
        )
        .expect_err("should fail");
        assert!(matches!(err, TuiError::InvalidOptions { ref kind, .. } if kind == "confirm"));
    }

    #[test]
    fn test_null_options_use_defaults() {
        let widget = create(ComponentKind::Input, Value::Null, 40, 4, &palette()).expect("create");
        assert_eq!(widget.kind(), ComponentKind::Input);
    }

    #[test]
    fn test_create_standalone_matches_kind() {
        for kind in ComponentKind::ALL {
            let options = match kind {
                ComponentKind::Choose | ComponentKind::Filter => json!({"options": ["a"]}),
                ComponentKind::Table => json!({"columns": ["A"], "rows": [["1"]]}),
                _ => json!({}),
            };
            let widget = create_standalone(kind, options).expect("create");
            assert_eq!(widget.kind(), kind);
        }
        assert!(create_standalone(ComponentKind::Confirm, json!({"default": 3})).is_err());
    }

    #[test]
    fn test_every_kind_cancels_with_escape() {
        for kind in ComponentKind::ALL {
            let options = match kind {
                ComponentKind::Choose | ComponentKind::Filter => json!({"options": ["a"]}),
                ComponentKind::Table => json!({"columns": ["A"], "rows": [["1"]]}),
                ComponentKind::Spin => json!({"title": "x", "command": ["true"]}),
                _ => json!({}),
            };
            let mut widget = create(kind, options, 40, 10, &palette()).expect("create");
            widget.update(key(KeyCode::Esc));
            assert!(widget.is_done(), "{} should be done", kind);
            assert!(widget.is_cancelled(), "{} should be cancelled", kind);
            assert!(
                matches!(widget.result(), Err(TuiError::Cancelled)),
                "{} should report cancellation",
                kind
            );
            assert_eq!(widget.view(), "", "{} should render nothing once done", kind);
        }
    }

    #[test]
    fn test_every_kind_cancels_with_ctrl_c() {
        for kind in ComponentKind::ALL {
            let options = match kind {
                ComponentKind::Choose | ComponentKind::Filter => json!({"options": ["a"]}),
                ComponentKind::Table => json!({"columns": ["A"], "rows": [["1"]]}),
                ComponentKind::Spin => json!({"title": "x", "command": ["true"]}),
                _ => json!({}),
            };
            let mut widget = create(kind, options, 40, 10, &palette()).expect("create");
            widget.update(ctrl('c'));
            assert!(widget.is_cancelled(), "{} should be cancelled", kind);
        }
    }

    #[test]
    fn test_wire_results() {
        assert_eq!(
            wire_result(
                ComponentKind::Filter,
                &ComponentValue::List(vec!["b".into(), "a".into()])
            ),
            json!({"selected": ["b", "a"]})
        );
        assert_eq!(
            wire_result(ComponentKind::Confirm, &ComponentValue::Bool(true)),
            json!({"confirmed": true})
        );
        assert_eq!(
            wire_result(ComponentKind::Write, &ComponentValue::Text("x\ny".into())),
            json!({"value": "x\ny"})
        );
        assert_eq!(
            wire_result(ComponentKind::File, &ComponentValue::Text("/tmp/a".into())),
            json!({"path": "/tmp/a"})
        );
        assert_eq!(
            wire_result(ComponentKind::Table, &ComponentValue::None),
            json!({"selected_index": -1, "selected_row": []})
        );
        assert_eq!(
            wire_result(
                ComponentKind::Spin,
                &ComponentValue::Spin(SpinOutput {
                    stdout: "out".into(),
                    stderr: String::new(),
                    exit_code: 3,
                })
            ),
            json!({"stdout": "out", "stderr": "", "exit_code": 3})
        );
        assert_eq!(
            wire_result(ComponentKind::Pager, &ComponentValue::None),
            json!({})
        );
    }
}
