use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors surfaced while executing a command line.
///
/// None of these are fatal to the shell process: the interactive loop reports
/// them and reads the next line.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The name did not resolve to a module file in the search path.
    #[error("module not found: {name}")]
    ModuleNotFound { name: String },

    /// The module ran but exited non-zero, or its output was not a JSON object.
    #[error("module '{name}' failed ({}): {reason}", path.display())]
    ExecutionFailed {
        name: String,
        path: PathBuf,
        reason: String,
    },

    #[error("{0}")]
    InvalidRange(String),

    #[error("unknown pipeline operator or module: {0}")]
    UnknownPipelineStage(String),

    /// A line of a batch script failed; the rest of the script was skipped.
    #[error("{}:{line}: `{command}`: {source}", path.display())]
    Script {
        path: PathBuf,
        line: usize,
        command: String,
        #[source]
        source: Box<ShellError>,
    },

    /// A built-in command failed, usually on bad arguments.
    #[error(transparent)]
    Builtin(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a module that was found could not produce a result.
#[derive(Debug, Error)]
pub enum ModuleFailure {
    #[error("cannot start {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read module output: {0}")]
    Io(#[from] std::io::Error),

    #[error("module exited with {0}")]
    Exit(ExitStatus),

    #[error("invalid JSON output: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),
}
