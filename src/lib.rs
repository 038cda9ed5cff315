//! An interactive shell that runs JSON-speaking scripts as commands.
//!
//! Every command that is not a builtin is a *module*: an external script found
//! by name in the module search path. A module prints one JSON object, and the
//! shell threads that object through pipelines:
//!
//! ```text
//! ❯ sysinfo | select os,arch | tt
//! ❯ forloop 1..3 as $n do { greet $n }
//! ❯ foreach [md5 sha256] as $h do { $h "hello world" }
//! ```
//!
//! The entry point is [`Shell`], generic over the [`ModuleRunner`] used to call
//! modules. [`ProcessRunner`] spawns them as interpreter child processes.

mod builtin;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod history;
mod io_adapters;
pub mod lexer;
pub mod loops;
pub mod module;
pub mod pipeline;
pub mod render;
pub mod shell;
pub mod style;
pub mod value;
pub mod vars;

pub use error::ShellError;
pub use io_adapters::MemWriter;
pub use module::{ModuleLoader, ModuleRunner, ProcessRunner};
pub use shell::Shell;
pub use value::{DisplayMode, ModuleResult, Value};
