//! Command history, persisted one entry per line.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounded list of executed command lines, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<String>,
    capacity: usize,
    path: Option<PathBuf>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    /// A history kept in memory only.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            path: None,
        }
    }

    /// Loads the history stored at `path`; every later [`History::add`] writes back there.
    ///
    /// A missing file is an empty history. An unreadable one is reported and
    /// treated the same way.
    pub fn load(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let mut history = Self::new(capacity);
        match fs::read_to_string(&path) {
            Ok(text) => {
                history.entries = text
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
                    .collect();
                history.truncate();
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot read history"),
        }
        history.path = Some(path);
        history
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records a line and persists it. Blank lines are not recorded.
    pub fn add(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.entries.push(line.to_string());
        self.truncate();
        if let Err(e) = self.save() {
            tracing::warn!(error = %e, "cannot save history");
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` entries with their 1-based position in the history.
    pub fn last(&self, n: usize) -> impl Iterator<Item = (usize, &str)> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..]
            .iter()
            .enumerate()
            .map(move |(i, e)| (start + i + 1, e.as_str()))
    }

    /// Writes the history file, if this history has one.
    pub fn save(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut text = self.entries.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(path, text)
    }

    fn truncate(&mut self) {
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
    }
}
