//! # Configuration
//!
//! Two sources of configuration:
//!
//! - [`Settings`]: persisted colors in `~/.config/tuibridge/config.json`
//!   (resolved through the `directories` crate).
//! - [`TerminalMode`]: decided from the environment at startup. It says
//!   whether widgets may take over the terminal and where prompts go.
//!
//! ## Environment
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `TUIBRIDGE_INTERACTIVE` | set by the bridges on their child; forces accessible mode |
//! | `ACCESSIBLE` | forces accessible mode |
//! | `TUIBRIDGE_LOG_FILE` | see [`crate::logging`] |
//! | `TUIBRIDGE_TUI_ADDR` / `TUIBRIDGE_TUI_TOKEN` | see [`crate::server`] |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Set on children of an execution bridge.
pub const ENV_INTERACTIVE: &str = "TUIBRIDGE_INTERACTIVE";
pub const ENV_ACCESSIBLE: &str = "ACCESSIBLE";

/// Persisted user settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Background of modal overlays, `#rrggbb`.
    #[serde(default = "default_modal_background")]
    pub modal_background: String,
    /// Border of modal overlays, `#rrggbb`.
    #[serde(default = "default_modal_border")]
    pub modal_border: String,
    /// Title and cursor color, `#rrggbb`.
    #[serde(default = "default_accent")]
    pub accent: String,
}

fn default_modal_background() -> String {
    "#1a1a2e".to_string()
}

fn default_modal_border() -> String {
    "#7C3AED".to_string()
}

fn default_accent() -> String {
    "#7C3AED".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            modal_background: default_modal_background(),
            modal_border: default_modal_border(),
            accent: default_accent(),
        }
    }
}

impl Settings {
    /// Load settings from disk. Returns `Settings::default()` if the file
    /// does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::try_load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default settings");
            Self::default()
        })
    }

    fn try_load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load settings from a specific path. Returns `Settings::default()` if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(settings)
    }

    /// Save the settings to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Return the path to the config file.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "tuibridge")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.json"))
    }
}

/// Where prompts are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Terminal capabilities decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalMode {
    /// Line-oriented prompts instead of full-screen widgets.
    pub accessible: bool,
    /// Running as the child of an execution bridge.
    pub nested: bool,
    pub output: OutputStream,
}

impl TerminalMode {
    /// Inspect the process environment and stdin.
    pub fn detect() -> Self {
        Self::from_parts(
            std::env::var_os(ENV_INTERACTIVE).is_some(),
            std::env::var_os(ENV_ACCESSIBLE).is_some(),
            std::io::stdin().is_terminal(),
        )
    }

    /// Decide the mode from already-gathered facts.
    pub fn from_parts(nested: bool, accessible_flag: bool, stdin_is_tty: bool) -> Self {
        let accessible = nested || accessible_flag || !stdin_is_tty;
        let output = if nested || accessible_flag {
            OutputStream::Stderr
        } else {
            OutputStream::Stdout
        };
        Self {
            accessible,
            nested,
            output,
        }
    }
}
