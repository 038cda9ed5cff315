//! User-facing diagnostics and the durable error log.
//!
//! A [`Diagnostic`] is a multi-line report in the style of compiler errors: a
//! labelled title, an optional source location with the offending line, the
//! main message, then hints and notes. It never contains a backtrace.

use crate::style::{self, BOLD, CYAN, RED, YELLOW};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

/// Where the offending input came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Typed at the prompt or passed with `--exec`.
    Interactive,
    /// A script file, or a module file for execution failures.
    File { path: PathBuf, line: Option<usize> },
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    level: Level,
    label: String,
    title: String,
    location: Location,
    context: Option<String>,
    underline: Option<(usize, usize)>,
    message: Option<String>,
    hint: Option<String>,
    notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(label: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            label: label.into(),
            title: title.into(),
            location: Location::Interactive,
            context: None,
            underline: None,
            message: None,
            hint: None,
            notes: Vec::new(),
        }
    }

    pub fn warning(label: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            ..Self::error(label, title)
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// The source line the diagnostic refers to.
    pub fn with_context(mut self, line: impl Into<String>) -> Self {
        self.context = Some(line.into());
        self
    }

    /// Marks `len` characters of the context starting at character `start`.
    pub fn with_underline(mut self, start: usize, len: usize) -> Self {
        self.underline = Some((start, len));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn render(&self, colors: bool) -> String {
        let level_color = match self.level {
            Level::Error => RED,
            Level::Warning => YELLOW,
        };
        let bar = style::paint("│", CYAN, colors);
        let mut out = String::new();

        out.push_str(&style::paint(&format!("× {}", self.label), &format!("{BOLD}{level_color}"), colors));
        out.push(' ');
        out.push_str(&style::paint(&self.title, BOLD, colors));
        out.push('\n');

        let (location, line_no) = match &self.location {
            Location::Interactive => ("entry:repl".to_string(), None),
            Location::File { path, line: Some(n) } => (format!("{}:{}", path.display(), n), Some(*n)),
            Location::File { path, line: None } => (path.display().to_string(), None),
        };
        let gutter = line_no.map(|n| n.to_string()).unwrap_or_default();
        let pad = " ".repeat(gutter.len());

        out.push_str(&format!("{pad} {} {location}\n", style::paint("-->", CYAN, colors)));
        out.push_str(&format!("{pad} {bar}\n"));

        if let Some(context) = &self.context {
            out.push_str(&format!("{gutter} {bar} {context}\n"));
            let (start, len) = self
                .underline
                .unwrap_or((0, context.chars().count()));
            if len > 0 {
                let marks = style::paint(&"^".repeat(len), &format!("{BOLD}{level_color}"), colors);
                let message = self.message.as_deref().unwrap_or("");
                out.push_str(&format!("{pad} {bar} {}{marks} {message}\n", " ".repeat(start)));
            }
        } else if let Some(message) = &self.message {
            out.push_str(&format!("{pad} {bar} {message}\n"));
        }

        if let Some(hint) = &self.hint {
            out.push_str(&format!("{pad} {bar}\n"));
            out.push_str(&format!("{pad} {bar} {} {hint}\n", style::paint("hint:", BOLD, colors)));
        }
        for note in &self.notes {
            out.push_str(&format!("{pad} {bar} {} {note}\n", style::paint("note:", BOLD, colors)));
        }
        out.push('\n');
        out
    }
}

/// Append-only log of failures, kept for later inspection.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: Option<PathBuf>,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn log_execution_failure(&self, command: &str, module: &Path, error: &str) {
        self.append(&format!(
            "[{}] EXECUTION_ERROR\n  Command : {command}\n  Module  : {}\n  Error   : {error}\n  Hint    : Ensure module outputs only valid JSON\n----------------------------------------\n",
            timestamp(),
            module.display(),
        ));
    }

    pub fn log_script_failure(&self, script: &Path, line: usize, command: &str, error: &str) {
        self.append(&format!(
            "TIME: {}\nSCRIPT: {}\nLINE: {line}\nCOMMAND: {command}\nERROR: {error}\n---\n",
            timestamp(),
            script.display(),
        ));
    }

    /// Failing to write the log never fails the command being reported.
    fn append(&self, entry: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(entry.as_bytes()));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "cannot write error log");
        }
    }
}

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_interactive_without_colors() {
        let text = Diagnostic::error("err_module_not_found", "module not found")
            .with_context("nope a b")
            .with_underline(0, 4)
            .with_message("cannot find module 'nope'")
            .with_hint("expected nope.py in the modules directory")
            .with_note("current search path: /tmp/mods")
            .render(false);

        let expected = "\
× err_module_not_found module not found
 --> entry:repl
 │
 │ nope a b
 │ ^^^^ cannot find module 'nope'
 │
 │ hint: expected nope.py in the modules directory
 │ note: current search path: /tmp/mods

";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_file_location_has_line_gutter() {
        let text = Diagnostic::error("SCRIPT_ERROR", "Error running script")
            .with_location(Location::File {
                path: PathBuf::from("job.trex"),
                line: Some(12),
            })
            .with_context("scan 10.0.0.1")
            .render(false);

        assert!(text.contains("   --> job.trex:12\n"));
        assert!(text.contains("12 │ scan 10.0.0.1\n"));
        assert!(text.contains("   │ ^^^^^^^^^^^^^ \n"));
    }

    #[test]
    fn test_render_message_without_context() {
        let text = Diagnostic::warning("config", "bad key")
            .with_message("ignored")
            .render(true);
        assert!(text.contains("\x1b[33m"));
        assert!(text.contains("ignored"));
    }

    #[test]
    fn test_error_log_appends_entries() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path().join("nested").join("error.log"));

        log.log_execution_failure("sum 1 2", Path::new("/m/sum.py"), "exit status: 1");
        log.log_script_failure(Path::new("a.trex"), 3, "sum", "boom");

        let text = fs::read_to_string(log.path().unwrap()).unwrap();
        assert!(text.contains("EXECUTION_ERROR"));
        assert!(text.contains("  Module  : /m/sum.py"));
        assert!(text.contains("SCRIPT: a.trex\nLINE: 3\nCOMMAND: sum\nERROR: boom\n"));
    }

    #[test]
    fn test_disabled_log_writes_nothing() {
        let log = ErrorLog::disabled();
        log.log_script_failure(Path::new("a"), 1, "b", "c");
        assert!(log.path().is_none());
    }
}
