//! Session options loaded from `~/.config/tapline/config.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::stream::ReadaheadOptions;

/// Options shared by every stream opened through a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Largest chunk pulled from a source at once.
    pub chunk_size: usize,
    /// Readahead queue capacity, in chunks.
    pub buffer_chunks: usize,
    /// Seconds a read waits for the next chunk. `0` waits forever.
    pub stream_timeout_secs: u64,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Wrap opened streams in a readahead buffer.
    pub buffered: bool,
    /// Load the builtin `hls`, `dash` and `http` handlers.
    pub builtin_plugins: bool,
    /// Extra handler directories, loaded in order after the builtins.
    pub plugin_dirs: Vec<PathBuf>,
    pub user_agent: String,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            buffer_chunks: 64,
            stream_timeout_secs: 60,
            connect_timeout_secs: 10,
            buffered: true,
            builtin_plugins: true,
            plugin_dirs: Vec::new(),
            user_agent: concat!("tapline/", env!("CARGO_PKG_VERSION")).to_string(),
            headers: BTreeMap::new(),
        }
    }
}

impl SessionOptions {
    pub fn stream_timeout(&self) -> Option<Duration> {
        (self.stream_timeout_secs > 0).then(|| Duration::from_secs(self.stream_timeout_secs))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn readahead(&self) -> ReadaheadOptions {
        ReadaheadOptions {
            capacity: self.buffer_chunks.max(1),
            chunk_size: self.chunk_size.max(1),
            timeout: self.stream_timeout(),
        }
    }
}

/// Load options from the default config file.
///
/// Returns defaults if the file doesn't exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_options() -> Result<SessionOptions> {
    let path = config_path();
    if !path.exists() {
        return Ok(SessionOptions::default());
    }
    load_options_from(&path)
}

/// Load options from an explicit file.
pub fn load_options_from(path: &Path) -> Result<SessionOptions> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
}

/// Path to the default config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default handler directory, `~/.config/tapline/plugins`.
pub fn default_plugin_dir() -> PathBuf {
    config_dir().join("plugins")
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tapline")
}
