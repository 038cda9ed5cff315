//! The `~/.t-rex/.trexrc` configuration file.
//!
//! `key=value` lines set options and `#` starts a comment. Any other
//! non-blank line is a command, run once the shell is up.

use crate::history::DEFAULT_CAPACITY;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "\
# T-Rex Shell Configuration
module_paths=~/.t-rex/modules
use_colors=true
history_size=1000

# Prompt customization, e.g. prompt_template=%u@%h:%D❯
# %u = username
# %h = hostname
# %w = full working directory
# %d = full working directory (same as %w)
# %D = working directory basename only
# %~ = home directory relative path

prompt_template=❯
python_executable=python3
module_extension=py
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub module_paths: Vec<PathBuf>,
    pub use_colors: bool,
    pub prompt_template: String,
    pub history_size: usize,
    pub python_executable: String,
    pub module_extension: String,
    /// Commands to run at startup, in file order.
    pub startup: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            module_paths: Vec::new(),
            use_colors: true,
            prompt_template: "❯".to_string(),
            history_size: DEFAULT_CAPACITY,
            python_executable: "python3".to_string(),
            module_extension: "py".to_string(),
            startup: Vec::new(),
        }
    }
}

impl Config {
    /// Parses configuration text. `home` is used to expand a leading `~`.
    ///
    /// Unknown keys are ignored; a bad value keeps the default and is reported.
    pub fn parse(text: &str, home: Option<&Path>) -> Self {
        let mut config = Config::default();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                config.startup.push(line.to_string());
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "module_paths" => {
                    config.module_paths = value
                        .split(':')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(|p| expand_tilde(p, home))
                        .collect();
                }
                "use_colors" => config.use_colors = value != "false",
                "prompt_symbol" | "prompt_template" => config.prompt_template = value.to_string(),
                "history_size" => match value.parse() {
                    Ok(n) => config.history_size = n,
                    Err(_) => tracing::warn!(value, "ignoring invalid history_size"),
                },
                "python_executable" if !value.is_empty() => {
                    config.python_executable = value.to_string()
                }
                "module_extension" if !value.is_empty() => {
                    config.module_extension = value.trim_start_matches('.').to_string()
                }
                other => tracing::debug!(key = other, "ignoring config key"),
            }
        }
        config
    }

    /// Reads the file at `path`, writing [`DEFAULT_CONFIG`] there first if it does not exist.
    pub fn load_or_create(path: &Path, home: Option<&Path>) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
            fs::write(path, DEFAULT_CONFIG)
                .with_context(|| format!("cannot write default config to {}", path.display()))?;
            tracing::debug!(path = %path.display(), "created default config");
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Ok(Self::parse(&text, home))
    }
}

/// The user's home directory, from `$HOME`.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// `~/.t-rex`, where configuration, history, logs and modules live.
pub fn trex_dir(home: &Path) -> PathBuf {
    home.join(".t-rex")
}

/// Replaces a leading `~` with `home`. Without a home the path is kept as written.
pub fn expand_tilde(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}
