//! # tuibridge CLI
//!
//! ## Usage
//!
//! ```bash
//! # Run a command in a PTY; it may ask for widgets while it runs
//! tuibridge run -- ./deploy.sh --env staging
//!
//! # Same, behind plain pipes with local echo
//! tuibridge run --pipe -- python3 ask.py
//!
//! # Show one widget and print its JSON result
//! tuibridge tui confirm --options '{"title": "Continue?"}'
//! ```
//!
//! Inside a `run` session, `tuibridge tui` forwards the widget to the
//! session, which draws it as a modal over the command's output.
//!
//! ## Exit codes
//!
//! - `run`: the command's exit code, 130 when force-quit
//! - `tui`: 0 on success, 130 when cancelled, 1 on error

use tuibridge::bridge::{self, pipe, pty};
use tuibridge::component::{self, accessible, standalone, ComponentKind};
use tuibridge::config::{OutputStream, Settings, TerminalMode};
use tuibridge::error::is_cancellation;
use tuibridge::logging;
use tuibridge::server::Client;
use tuibridge::ui::terminal::install_panic_hook;
use tuibridge::ui::ModalPalette;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Modal TUI widgets over the live output of a running command
#[derive(Parser, Debug)]
#[command(name = "tuibridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Modal TUI widgets over the live output of a running command", long_about = None)]
struct Args {
    /// Write debug logs to this file (also TUIBRIDGE_LOG_FILE)
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command with its output in a scrollback view
    Run {
        /// Use pipes instead of a pseudo-terminal
        #[arg(long)]
        pipe: bool,

        /// Do not echo typed characters (pipe mode)
        #[arg(long, requires = "pipe")]
        no_echo: bool,

        /// Header title
        #[arg(long, default_value = "Running Command")]
        title: String,

        /// The command and its arguments
        #[arg(last = true, required = true, value_name = "CMD")]
        argv: Vec<String>,
    },

    /// Show a single widget and print its result as JSON
    Tui {
        /// choose, confirm, input, filter, file, table, pager, spin, write
        kind: String,

        /// Widget options as a JSON object
        #[arg(long, value_name = "JSON")]
        options: Option<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(path) = logging::log_file_path(args.log_file.clone()) {
        if let Err(e) = logging::init_global(&path) {
            eprintln!("Warning: {:#}", e);
        }
    }
    install_panic_hook();

    let outcome = match args.command {
        Commands::Run {
            pipe,
            no_echo,
            title,
            argv,
        } => run_command(pipe, !no_echo, title, &argv),
        Commands::Tui { kind, options } => show_component(&kind, options.as_deref()),
    };

    match outcome {
        Ok(code) => ExitCode::from(clamp_exit_code(code)),
        Err(e) if is_cancellation(&e) => ExitCode::from(clamp_exit_code(
            bridge::INTERRUPTED_EXIT_CODE,
        )),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Exit statuses are a byte; anything outside maps to 1.
fn clamp_exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

fn run_command(use_pipe: bool, echo_input: bool, title: String, argv: &[String]) -> Result<i32> {
    let command_name = argv.join(" ");
    tracing::info!(command = %command_name, pipe = use_pipe, "starting session");

    let result = if use_pipe {
        let options = pipe::PipeOptions {
            title,
            command_name,
            echo_input,
        };
        pipe::run(options, pipe::command_executor(argv.to_vec()))?
    } else {
        let palette = ModalPalette::from_settings(&Settings::load())
            .context("Failed to build modal palette")?;
        let options = pty::PtyOptions {
            title,
            command_name,
        };
        pty::run(argv, options, palette)?
    };

    if let Some(error) = &result.error {
        eprintln!("{}", error);
    }
    Ok(result.exit_code)
}

fn show_component(kind: &str, options: Option<&str>) -> Result<i32> {
    let kind: ComponentKind = kind.parse()?;
    let options: Value = match options {
        Some(text) => serde_json::from_str(text).context("Failed to parse --options JSON")?,
        None => Value::Null,
    };

    let result = match Client::from_env() {
        Some(client) => {
            tracing::debug!(addr = client.addr(), component = %kind, "delegating to parent session");
            client.show(kind.as_str(), options)?
        }
        None => show_locally(kind, options)?,
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", result).context("Failed to write result")?;
    Ok(0)
}

fn show_locally(kind: ComponentKind, options: Value) -> Result<Value> {
    let mode = TerminalMode::detect();
    let value = if mode.accessible {
        let mut input = io::stdin().lock();
        match mode.output {
            OutputStream::Stdout => accessible::prompt(kind, options, &mut input, &mut io::stdout())?,
            OutputStream::Stderr => accessible::prompt(kind, options, &mut input, &mut io::stderr())?,
        }
    } else {
        let widget = component::create_standalone(kind, options)?;
        standalone::run(widget, mode.output)?
    };
    Ok(component::wire_result(kind, &value))
}
