//! Tracing subscriber setup.
//!
//! The terminal belongs to the widgets and the bridged command, so log lines
//! only ever go to a file. Without a log file no subscriber is installed and
//! the `tracing` macros are no-ops.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_FILE: &str = "TUIBRIDGE_LOG_FILE";

/// The log file named by the command line, else by [`ENV_LOG_FILE`].
pub fn log_file_path(cli: Option<PathBuf>) -> Option<PathBuf> {
    cli.or_else(|| {
        std::env::var_os(ENV_LOG_FILE)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}

/// Install the global subscriber writing to `path`.
pub fn init_global(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;
    build_subscriber(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    tracing::debug!(path = %path.display(), "logging initialized");
    Ok(())
}

/// `RUST_LOG` when set, otherwise everything at debug and above.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
}

pub fn build_subscriber(file: File) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(file));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter())
}
