use anyhow::{Context, Result};
use argh::FromArgs;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use trex::config::{self, Config};
use trex::diagnostic::{Diagnostic, ErrorLog};
use trex::history::History;
use trex::style::{self, CYAN, GREEN, RED};
use trex::{ModuleLoader, ModuleRunner, ProcessRunner, Shell};

const BANNER: &str = r"
  dP
  88
d8888P          88d888b. .d8888b. dP.  .dP
  88   88888888 88'  '88 88ooood8  '8bd8'
  88            88       88.  ...  .d88b.
  dP            dP       '88888P' dP'  'dP
";

#[derive(FromArgs)]
/// T-Rex: an interactive shell for JSON-speaking modules.
struct Args {
    #[argh(option)]
    /// directory to load modules from, instead of the configured paths.
    path: Option<PathBuf>,

    #[argh(switch)]
    /// show the banner and exit.
    banner: bool,

    #[argh(option)]
    /// execute a command and exit.
    exec: Option<String>,

    #[argh(switch)]
    /// show version information and exit.
    version: bool,

    #[argh(switch)]
    /// verbose: echo script lines and log at debug level.
    vv: bool,

    #[argh(positional)]
    /// script file to run, one command per line.
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    // RUST_LOG wins over the verbosity flag.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.vv { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    if args.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }
    if args.banner {
        print_banner(true);
        return Ok(ExitCode::SUCCESS);
    }

    let home = config::home_dir();
    let trex_dir = home.as_deref().map(config::trex_dir);

    let mut config = match &trex_dir {
        Some(dir) => Config::load_or_create(&dir.join(".trexrc"), home.as_deref())
            .unwrap_or_else(|e| {
                let report = Diagnostic::warning("config", "cannot load configuration")
                    .with_message(format!("{e:#}"))
                    .with_hint("continuing with the built-in defaults");
                eprint!("{}", report.render(true));
                Config::default()
            }),
        None => Config::default(),
    };
    if config.module_paths.is_empty() {
        config.module_paths.extend(trex_dir.as_ref().map(|d| d.join("modules")));
    }

    if let Some(path) = &args.path {
        if !path.is_dir() {
            let report = Diagnostic::error("err_invalid_path", "invalid module path")
                .with_message(format!("{} is not a directory", path.display()))
                .with_hint("pass an existing directory to --path");
            eprint!("{}", report.render(config.use_colors));
            return Ok(ExitCode::FAILURE);
        }
        config.module_paths = vec![path.clone()];
    }

    let runner = ProcessRunner::new(
        ModuleLoader::new(config.module_paths.clone(), config.module_extension.clone()),
        config.python_executable.clone(),
    );
    let history = match &trex_dir {
        Some(dir) => History::load(dir.join("history"), config.history_size),
        None => History::new(config.history_size),
    };
    let error_log = trex_dir
        .as_ref()
        .map(|d| ErrorLog::new(d.join("error.log")))
        .unwrap_or_else(ErrorLog::disabled);

    let mut shell = Shell::new(runner)
        .with_colors(config.use_colors)
        .with_history(history)
        .with_error_log(error_log)
        .with_verbose(args.vv);
    tracing::debug!(paths = ?config.module_paths, "shell ready");

    for command in &config.startup {
        run_line(&mut shell, command);
    }

    if let Some(script) = args.script.as_deref().filter(|p| p.is_file()) {
        // Failures were already reported with their script line.
        let _ = shell.execute_file(script);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(command) = &args.exec {
        run_line(&mut shell, command);
        return Ok(ExitCode::SUCCESS);
    }

    repl(&mut shell, &config.prompt_template, home.as_deref())?;
    Ok(ExitCode::SUCCESS)
}

fn repl<R: ModuleRunner>(shell: &mut Shell<R>, template: &str, home: Option<&Path>) -> Result<()> {
    let colors = shell.colors();
    print_banner(colors);

    let mut rl = DefaultEditor::new().context("cannot start the line editor")?;
    for entry in shell.history().entries() {
        rl.add_history_entry(entry.as_str())?;
    }

    loop {
        let prompt = build_prompt(template, home, colors);
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                rl.add_history_entry(line)?;
                shell.history_mut().add(line);
                run_line(shell, line);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(e) => return Err(e).context("cannot read input"),
        }
    }

    println!("{}", style::paint("Goodbye! 👋", GREEN, colors));
    Ok(())
}

/// Runs one line, reporting a failure without stopping the shell.
fn run_line<R: ModuleRunner>(shell: &mut Shell<R>, line: &str) {
    if let Err(e) = shell.execute(line) {
        tracing::debug!(error = ?e, line, "command failed");
        eprintln!("{}", style::paint(&format!("× {e}"), RED, shell.colors()));
    }
}

fn print_banner(colors: bool) {
    println!("{}", style::paint(BANNER, CYAN, colors));
    println!("  version {}\n", env!("CARGO_PKG_VERSION"));
}

fn build_prompt(template: &str, home: Option<&Path>, colors: bool) -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "user".to_string());
    let cwd = std::env::current_dir().unwrap_or_default();
    let text = expand_prompt(template, &user, &host_name(), &cwd, home);
    format!("{} ", style::paint(&text, CYAN, colors))
}

fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

/// Substitutes the `%u %h %w %d %D %~` codes of a prompt template.
fn expand_prompt(template: &str, user: &str, host: &str, cwd: &Path, home: Option<&Path>) -> String {
    let full = cwd.display().to_string();
    let base = cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| full.clone());
    let relative = match home.and_then(|h| cwd.strip_prefix(h).ok()) {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~/{}", rest.display()),
        None => full.clone(),
    };
    template
        .replace("%u", user)
        .replace("%h", host)
        .replace("%w", &full)
        .replace("%d", &full)
        .replace("%D", &base)
        .replace("%~", &relative)
}
