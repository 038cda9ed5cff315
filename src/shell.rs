//! The shell session and its per-line dispatcher.
//!
//! Each line is claimed by the first of these that matches: a script file,
//! a variable assignment, a `forloop`/`foreach`, a pipeline, a builtin, and
//! finally a module call.

use crate::builtin::{self, BuiltinFactory, Context};
use crate::diagnostic::{Diagnostic, ErrorLog, Location};
use crate::error::ShellError;
use crate::history::History;
use crate::lexer::{has_pipe, split_pipeline, tokenize};
use crate::loops::Loop;
use crate::module::ModuleRunner;
use crate::pipeline::{Head, Stage, project};
use crate::render::Renderer;
use crate::value::ModuleResult;
use crate::vars::{Assignment, Variables};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One shell session: variables, history and the module runner, plus where
/// results and diagnostics are written.
pub struct Shell<R> {
    runner: R,
    vars: Variables,
    history: History,
    renderer: Renderer,
    error_log: ErrorLog,
    builtins: Vec<Box<dyn BuiltinFactory>>,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    verbose: bool,
    /// Script file and line being executed, if any.
    script: Option<(PathBuf, usize)>,
}

impl<R: ModuleRunner> Shell<R> {
    /// A session printing to stdout/stderr, with colors and no error log.
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            vars: Variables::new(),
            history: History::default(),
            renderer: Renderer::new(true),
            error_log: ErrorLog::disabled(),
            builtins: builtin::defaults(),
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
            verbose: false,
            script: None,
        }
    }

    /// Redirects results to `out` and diagnostics to `err`.
    pub fn with_output(mut self, out: impl Write + 'static, err: impl Write + 'static) -> Self {
        self.out = Box::new(out);
        self.err = Box::new(err);
        self
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.renderer = Renderer::new(colors);
        self
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn with_error_log(mut self, error_log: ErrorLog) -> Self {
        self.error_log = error_log;
        self
    }

    /// In verbose mode script lines are echoed before they run.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn colors(&self) -> bool {
        self.renderer.colors
    }

    pub fn vars(&self) -> &Variables {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut Variables {
        &mut self.vars
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Executes one command line.
    ///
    /// Errors have already been reported to the diagnostics writer when they
    /// come from a module; the caller decides whether to go on.
    pub fn execute(&mut self, line: &str) -> Result<(), ShellError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let path = Path::new(line);
        if path.is_file() {
            tracing::debug!(path = %path.display(), "dispatch: script file");
            return self.execute_file(path);
        }

        let tokens = tokenize(line);
        if let Some(Assignment { name, value }) = Assignment::parse(line, &tokens) {
            tracing::debug!(%name, %value, "dispatch: assignment");
            writeln!(self.out, "{name}={value}")?;
            self.vars.set(name, value);
            return Ok(());
        }

        if let Some(lp) = Loop::parse(line) {
            tracing::debug!(kind = ?lp.kind, var = %lp.var, "dispatch: loop");
            return self.run_loop(&lp);
        }

        if has_pipe(line) {
            tracing::debug!("dispatch: pipeline");
            return self.run_pipeline(line);
        }

        let Some((name, args)) = tokens.split_first() else {
            return Ok(());
        };
        let args: Vec<String> = args.iter().map(|a| self.vars.expand(a)).collect();
        if let Some(outcome) = self.run_builtin(name, &args) {
            tracing::debug!(%name, "dispatch: builtin");
            return outcome;
        }

        let name = self.vars.expand(name);
        tracing::debug!(%name, ?args, "dispatch: module");
        if let Some(result) = self.invoke_module(&name, &args)? {
            self.print_result(&result)?;
        }
        Ok(())
    }

    /// Runs every command of a script file, stopping at the first failure.
    ///
    /// Blank lines and `#` comments are skipped. The failure is logged,
    /// reported with its file and line, and returned wrapped in
    /// [`ShellError::Script`].
    pub fn execute_file(&mut self, path: &Path) -> Result<(), ShellError> {
        let text = fs::read_to_string(path)?;
        if self.verbose {
            writeln!(self.out, "Running script: {}", path.display())?;
        }
        let outer = self.script.take();
        let outcome = self.run_script(path, &text);
        self.script = outer;
        outcome
    }

    fn run_script(&mut self, path: &Path, text: &str) -> Result<(), ShellError> {
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let n = idx + 1;
            if self.verbose {
                writeln!(self.out, " {n} $ {line}")?;
            }
            self.history.add(line);
            self.script = Some((path.to_path_buf(), n));

            if let Err(e) = self.execute(line) {
                let message = e.to_string();
                self.error_log.log_script_failure(path, n, line, &message);
                self.emit(
                    &Diagnostic::error("SCRIPT_ERROR", "error running script")
                        .with_location(Location::File {
                            path: path.to_path_buf(),
                            line: Some(n),
                        })
                        .with_context(line)
                        .with_message(message)
                        .with_hint("check the command and module output for errors"),
                );
                return Err(ShellError::Script {
                    path: path.to_path_buf(),
                    line: n,
                    command: line.to_string(),
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }

    /// Runs a loop body once per value with the loop variable bound.
    ///
    /// The variable is unbound afterwards, whether the loop finished or not.
    fn run_loop(&mut self, lp: &Loop) -> Result<(), ShellError> {
        let lp = Loop {
            source: self.vars.expand(&lp.source),
            ..lp.clone()
        };
        let values = lp.values()?;
        let outcome = self.iterate(&lp.var, &values, &lp.body);
        self.vars.remove(&lp.var);
        outcome
    }

    fn iterate(&mut self, var: &str, values: &[String], body: &[String]) -> Result<(), ShellError> {
        for value in values {
            self.vars.set(var, value.as_str());
            for command in body {
                // A nested loop expands its own body when it runs it.
                let command = if Loop::parse(command).is_some() {
                    command.clone()
                } else {
                    self.vars.expand(command)
                };
                tracing::trace!(var, %value, %command, "loop iteration");
                self.execute(&command)?;
            }
        }
        Ok(())
    }

    /// Evaluates `head | stage | ...` and renders the final result.
    ///
    /// Any failing stage aborts the whole pipeline without rendering; a module
    /// returning no result ends it silently.
    fn run_pipeline(&mut self, line: &str) -> Result<(), ShellError> {
        let segments = split_pipeline(line);
        let Some((head, stages)) = segments.split_first() else {
            return Ok(());
        };

        let mut result = match Head::parse(head) {
            Head::Empty => return Ok(()),
            Head::Literal(result) => result,
            Head::Command { name, args } => {
                let name = self.vars.expand(&name);
                let args: Vec<String> = args.iter().map(|a| self.vars.expand(a)).collect();
                match self.invoke_module(&name, &args)? {
                    Some(result) => result,
                    None => return Ok(()),
                }
            }
        };

        for segment in stages {
            let Some(stage) = Stage::parse(segment) else {
                continue;
            };
            tracing::debug!(?stage, "pipeline stage");
            match stage {
                Stage::Module { name, args } => {
                    let name = self.vars.expand(&name);
                    if self.runner.find(&name).is_none() {
                        self.emit(
                            &Diagnostic::error("err_unknown_stage", "unknown pipeline stage")
                                .with_location(self.location())
                                .with_context(line)
                                .with_message(format!("'{name}' is not an operator or module"))
                                .with_hint("operators are select, pp and tt; run `modules` to list modules"),
                        );
                        return Err(ShellError::UnknownPipelineStage(name));
                    }
                    let mut args: Vec<String> = args.iter().map(|a| self.vars.expand(a)).collect();
                    args.extend(project(result.output.as_ref()));
                    match self.invoke_module(&name, &args)? {
                        Some(next) => result = next,
                        None => return Ok(()),
                    }
                }
                directive => directive.apply(&mut result),
            }
        }

        self.print_result(&result)
    }

    /// Calls a module through the runner, reporting failures.
    ///
    /// A missing module and a failed execution are both printed as
    /// diagnostics; failed executions are also appended to the error log.
    /// The error is returned either way.
    pub fn invoke_module(&mut self, name: &str, args: &[String]) -> Result<Option<ModuleResult>, ShellError> {
        let e = match self.runner.invoke(name, args) {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let command = std::iter::once(name)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let diagnostic = match &e {
            ShellError::ModuleNotFound { name } => {
                let paths: Vec<String> = self
                    .runner
                    .search_paths()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                Some(Diagnostic::error("err_module_not_found", "module not found")
                    .with_location(self.location())
                    .with_context(&command)
                    .with_underline(0, name.chars().count())
                    .with_message(format!("cannot find module '{name}'"))
                    .with_hint(format!(
                        "expected to find {} in the modules directory",
                        self.runner.file_name(name)
                    ))
                    .with_note(format!("current search path: {}", paths.join(":")))
                    .with_note("run `modules` to see available modules"))
            }
            ShellError::ExecutionFailed { name, path, reason } => {
                self.error_log.log_execution_failure(&command, path, reason);
                Some(
                    Diagnostic::error("err_execution_failed", "module execution failed")
                        .with_location(Location::File {
                            path: self.relative_module_path(path),
                            line: None,
                        })
                        .with_message(format!("{name}: {reason}"))
                        .with_hint("module must print valid JSON to stdout and nothing else")
                        .with_note("no stray prints, debug output, tracebacks, or syntax errors allowed")
                        .with_note(format!("full path: {}", path.display())),
                )
            }
            _ => None,
        };
        if let Some(diagnostic) = diagnostic {
            self.emit(&diagnostic);
        }
        Err(e)
    }

    fn run_builtin(&mut self, name: &str, args: &[String]) -> Option<Result<(), ShellError>> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let cmd = self.builtins.iter().find_map(|f| f.try_create(name, &args))?;
        let ctx = Context {
            vars: &self.vars,
            history: &self.history,
            runner: &self.runner,
            builtins: &self.builtins,
        };
        Some(cmd.run(self.out.as_mut(), &ctx).map_err(ShellError::from))
    }

    fn print_result(&mut self, result: &ModuleResult) -> Result<(), ShellError> {
        self.out.write_all(self.renderer.render(result).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn location(&self) -> Location {
        match &self.script {
            Some((path, line)) => Location::File {
                path: path.clone(),
                line: Some(*line),
            },
            None => Location::Interactive,
        }
    }

    fn relative_module_path(&self, path: &Path) -> PathBuf {
        self.runner
            .search_paths()
            .iter()
            .find_map(|dir| path.strip_prefix(dir).ok())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf())
    }

    fn emit(&mut self, diagnostic: &Diagnostic) {
        let text = diagnostic.render(self.renderer.colors);
        if let Err(e) = self.err.write_all(text.as_bytes()).and_then(|_| self.err.flush()) {
            tracing::warn!(error = %e, "cannot write diagnostic");
        }
    }
}
