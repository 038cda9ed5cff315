use crate::history::History;
use crate::module::ModuleRunner;
use crate::vars::Variables;
use anyhow::{Result, bail};
use argh::{EarlyExit, FromArgs};
use std::io::Write;

/// Pipeline operators and loop constructs, described by `help`.
const DIRECTIVES: &[(&str, &str)] = &[
    (
        "select",
        "select <field1>,<field2>,...\n  Keep only the named fields of a map output (pipe operation).\n  Example: sysinfo | select os,arch",
    ),
    (
        "pp",
        "pp\n  Pretty print the output as an indented key/value listing (pipe operation).\n  Example: ls | pp",
    ),
    (
        "tt",
        "tt\n  Print the output as a table (pipe operation).\n  Example: ls | tt",
    ),
    (
        "forloop",
        "forloop <range> as $<var> do { <cmd>; <cmd> }\n  Run the body once per value. Ranges: A..B, a,b,c or N (0..N-1).\n  Example: forloop 1..3 as $n do { echo $n }",
    ),
    (
        "foreach",
        "foreach <list> as $<var> do { <cmd>; <cmd> }\n  Run the body once per item. Lists: [a b \"c d\"] or \"a\"|\"b\".\n  Example: foreach [md5 sha256] as $h do { $h hello }",
    ),
    (
        "set",
        "set <name> [=] <value...>\n  Set a variable. Also: let, NAME=VALUE, export NAME=VALUE, $NAME value.\n  Reference it later as $name or ${name}.",
    ),
    ("exit", "exit\n  Exit the shell. Same as quit or Ctrl-D."),
];

/// What a built-in can see of the running shell.
pub(crate) struct Context<'a> {
    pub vars: &'a Variables,
    pub history: &'a History,
    pub runner: &'a dyn ModuleRunner,
    pub builtins: &'a [Box<dyn BuiltinFactory>],
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and run in-process,
/// ahead of any module with the same name.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "help".
    fn name() -> &'static str;

    /// One line shown in the `help` overview.
    fn summary() -> &'static str;

    fn execute(self, out: &mut dyn Write, ctx: &Context<'_>) -> Result<()>;
}

/// A parsed builtin, ready to run.
pub(crate) trait Builtin {
    fn run(self: Box<Self>, out: &mut dyn Write, ctx: &Context<'_>) -> Result<()>;
}

impl<T: BuiltinCommand> Builtin for T {
    fn run(self: Box<Self>, out: &mut dyn Write, ctx: &Context<'_>) -> Result<()> {
        T::execute(*self, out, ctx)
    }
}

/// Argument parsing stopped early: either `--help` output or a usage error.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl Builtin for InvalidArgs {
    fn run(self: Box<Self>, out: &mut dyn Write, _ctx: &Context<'_>) -> Result<()> {
        if self.is_error {
            bail!("{}", self.output.trim_end());
        }
        out.write_all(self.output.as_bytes())?;
        Ok(())
    }
}

/// Creates builtins by name.
pub(crate) trait BuiltinFactory {
    fn name(&self) -> &'static str;

    fn summary(&self) -> &'static str;

    /// The argh-generated usage text.
    fn usage(&self) -> String;

    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn Builtin>>;
}

pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> BuiltinFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn summary(&self) -> &'static str {
        T::summary()
    }

    fn usage(&self) -> String {
        match T::from_args(&[T::name()], &["--help"]) {
            Ok(_) => String::new(),
            Err(EarlyExit { output, .. }) => output,
        }
    }

    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn Builtin>> {
        if name != T::name() {
            return None;
        }
        Some(match T::from_args(&[name], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

/// The builtins every shell starts with.
pub(crate) fn defaults() -> Vec<Box<dyn BuiltinFactory>> {
    vec![
        Box::new(Factory::<Help>::default()),
        Box::new(Factory::<HistoryCmd>::default()),
        Box::new(Factory::<Modules>::default()),
        Box::new(Factory::<Vars>::default()),
        Box::new(Factory::<Clear>::default()),
    ]
}

#[derive(FromArgs)]
/// Display help for built-in commands, pipeline operators and loops.
pub struct Help {
    #[argh(positional)]
    /// command or operator to describe; lists everything when omitted.
    pub command: Option<String>,
}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn summary() -> &'static str {
        "show help, or help for one command"
    }

    fn execute(self, out: &mut dyn Write, ctx: &Context<'_>) -> Result<()> {
        let Some(command) = self.command else {
            writeln!(out, "T-REX SHELL - Built-in Commands\n")?;
            for factory in ctx.builtins {
                writeln!(out, "  {:<10} {}", factory.name(), factory.summary())?;
            }
            writeln!(out, "\nOperators and constructs\n")?;
            for (name, text) in DIRECTIVES {
                let first = text.lines().nth(1).unwrap_or_default().trim();
                writeln!(out, "  {name:<10} {first}")?;
            }
            writeln!(out, "\nAnything else runs a module. Use 'help <command>' for details.")?;
            return Ok(());
        };

        if let Some(factory) = ctx.builtins.iter().find(|f| f.name() == command) {
            out.write_all(factory.usage().as_bytes())?;
        } else if let Some((_, text)) = DIRECTIVES.iter().find(|(name, _)| *name == command) {
            writeln!(out, "{text}")?;
        } else if let Some(path) = ctx.runner.find(&command) {
            writeln!(out, "{command}: module at {}", path.display())?;
        } else {
            writeln!(out, "No help available for: {command}")?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Show the command history, oldest first.
pub struct HistoryCmd {
    #[argh(positional)]
    /// only show the last N entries.
    pub count: Option<usize>,
}

impl BuiltinCommand for HistoryCmd {
    fn name() -> &'static str {
        "history"
    }

    fn summary() -> &'static str {
        "show command history; 'history 10' shows the last 10"
    }

    fn execute(self, out: &mut dyn Write, ctx: &Context<'_>) -> Result<()> {
        let count = self.count.unwrap_or(ctx.history.len());
        for (n, entry) in ctx.history.last(count) {
            writeln!(out, "{n:>5}  {entry}")?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// List the modules found in the search path.
pub struct Modules {}

impl BuiltinCommand for Modules {
    fn name() -> &'static str {
        "modules"
    }

    fn summary() -> &'static str {
        "list available modules"
    }

    fn execute(self, out: &mut dyn Write, ctx: &Context<'_>) -> Result<()> {
        let names = ctx.runner.available();
        if names.is_empty() {
            let paths: Vec<String> = ctx
                .runner
                .search_paths()
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            writeln!(out, "no modules found in: {}", paths.join(":"))?;
            return Ok(());
        }
        for name in names {
            writeln!(out, "{name}")?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print all variables as NAME=VALUE, sorted by name.
pub struct Vars {}

impl BuiltinCommand for Vars {
    fn name() -> &'static str {
        "vars"
    }

    fn summary() -> &'static str {
        "list variables"
    }

    fn execute(self, out: &mut dyn Write, ctx: &Context<'_>) -> Result<()> {
        for (name, value) in ctx.vars.sorted() {
            writeln!(out, "{name}={value}")?;
        }
        Ok(())
    }
}

#[derive(FromArgs)]
/// Clear the terminal screen.
pub struct Clear {}

impl BuiltinCommand for Clear {
    fn name() -> &'static str {
        "clear"
    }

    fn summary() -> &'static str {
        "clear the terminal screen"
    }

    fn execute(self, out: &mut dyn Write, _ctx: &Context<'_>) -> Result<()> {
        out.write_all(b"\x1b[2J\x1b[H")?;
        out.flush()?;
        Ok(())
    }
}
