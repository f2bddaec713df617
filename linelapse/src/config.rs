//! Process-scoped configuration read once at startup.
//!
//! Every key is optional; a missing file means defaults. A file that exists
//! but does not parse is a soft failure: the problem goes to stderr and the
//! defaults are used, so a typo never blocks a query.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level `config.toml` layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub history: HistoryConfig,
    pub diff: DiffConfig,
    pub render: RenderConfig,
    pub log: LogConfig,
}

/// `[history]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Stop reading history after this many commits. Unset reads everything.
    pub max_commits: Option<usize>,
}

/// `[diff]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Unchanged lines around each hunk.
    pub context_lines: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self { context_lines: 3 }
    }
}

/// `[render]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub color: bool,
    pub line_numbers: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { color: true, line_numbers: true }
    }
}

/// `[log]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: "warn".to_owned() }
    }
}

impl Config {
    /// Parses a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Loads `explicit` if given, otherwise the XDG config file.
    ///
    /// Returns defaults if the file does not exist or cannot be parsed; an
    /// explicit path that cannot be read is reported on stderr as well.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = explicit.map(Path::to_path_buf).unwrap_or_else(path);
        let raw = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                if explicit.is_some() {
                    eprintln!("linelapse: cannot read config {:?}: {}", path, e);
                }
                return Self::default();
            }
        };
        match Self::from_toml(&raw) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("linelapse: config parse error in {:?}: {}", path, e);
                Self::default()
            }
        }
    }
}

/// Returns the path to the linelapse config file.
///
/// Prefers `$XDG_CONFIG_HOME/linelapse/config.toml`; falls back to
/// `~/.config/linelapse/config.toml` when the env var is absent.
pub fn path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("linelapse").join("config.toml")
}
