//! Module discovery and invocation.
//!
//! A module is a script `<name>.<ext>` in one of the search directories. It is
//! run by an interpreter with the call arguments appended, and must print a
//! single JSON object on stdout. Its stderr is forwarded to ours live.

use crate::error::{ModuleFailure, ShellError};
use crate::value::ModuleResult;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Capability to call modules by name.
///
/// The shell core only talks to modules through this trait, so it can be
/// driven without spawning processes.
pub trait ModuleRunner {
    /// Path of the module, if it resolves.
    fn find(&self, name: &str) -> Option<PathBuf>;

    /// Runs the module.
    ///
    /// `Ok(None)` means the module produced no result (a JSON `null`).
    fn invoke(&mut self, name: &str, args: &[String]) -> Result<Option<ModuleResult>, ShellError>;

    /// Names of all modules that can be called, sorted.
    fn available(&self) -> Vec<String>;

    /// Directories searched for modules, for diagnostics.
    fn search_paths(&self) -> Vec<PathBuf>;

    /// File name a module called `name` would have.
    fn file_name(&self, name: &str) -> String;
}

/// Resolves module names to files.
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    paths: Vec<PathBuf>,
    extension: String,
}

impl ModuleLoader {
    pub fn new(paths: Vec<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            paths,
            extension: extension.into(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn file_name(&self, name: &str) -> String {
        format!("{name}.{}", self.extension)
    }

    /// Searches the configured directories in order, then the current directory.
    ///
    /// Names containing a path separator never resolve.
    pub fn find_module(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || Path::new(name).components().count() != 1 {
            return None;
        }
        let file = self.file_name(name);
        self.paths
            .iter()
            .map(|dir| dir.join(&file))
            .chain(std::iter::once(PathBuf::from(&file)))
            .find(|p| p.is_file())
    }

    /// Module names found in the search directories.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .paths
            .iter()
            .filter_map(|dir| std::fs::read_dir(dir).ok())
            .flatten()
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension() == Some(OsStr::new(&self.extension)))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Runs modules as interpreter child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    loader: ModuleLoader,
    interpreter: String,
}

impl ProcessRunner {
    pub fn new(loader: ModuleLoader, interpreter: impl Into<String>) -> Self {
        Self {
            loader,
            interpreter: interpreter.into(),
        }
    }

    fn execute(&self, name: &str, path: &Path, args: &[String]) -> Result<Option<ModuleResult>, ModuleFailure> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(path)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Ok(joined) = std::env::join_paths(self.loader.paths()) {
            cmd.env("PYTHONPATH", joined);
        }

        tracing::debug!(module = name, path = %path.display(), ?args, "spawning module");
        let mut child = cmd.spawn().map_err(|source| ModuleFailure::Spawn {
            interpreter: self.interpreter.clone(),
            source,
        })?;

        let forwarder = child.stderr.take().map(|stderr| {
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    eprintln!("{line}");
                }
            })
        });

        let mut stdout = Vec::new();
        let read = match child.stdout.take() {
            Some(mut pipe) => pipe.read_to_end(&mut stdout).map(|_| ()),
            None => Ok(()),
        };
        let status = child.wait()?;
        if let Some(handle) = forwarder {
            let _ = handle.join();
        }
        read?;

        if !status.success() {
            return Err(ModuleFailure::Exit(status));
        }
        parse_output(&stdout)
    }
}

/// Decodes a module's stdout: a JSON object, or `null` for no result.
pub fn parse_output(stdout: &[u8]) -> Result<Option<ModuleResult>, ModuleFailure> {
    match serde_json::from_slice::<serde_json::Value>(stdout)? {
        serde_json::Value::Object(obj) => Ok(Some(ModuleResult::from_json_object(obj))),
        serde_json::Value::Null => Ok(None),
        other => Err(ModuleFailure::NotAnObject(other.to_string())),
    }
}

impl ModuleRunner for ProcessRunner {
    fn find(&self, name: &str) -> Option<PathBuf> {
        self.loader.find_module(name)
    }

    fn invoke(&mut self, name: &str, args: &[String]) -> Result<Option<ModuleResult>, ShellError> {
        let path = self.find(name).ok_or_else(|| ShellError::ModuleNotFound {
            name: name.to_string(),
        })?;
        self.execute(name, &path, args)
            .map_err(|failure| ShellError::ExecutionFailed {
                name: name.to_string(),
                path,
                reason: failure.to_string(),
            })
    }

    fn available(&self) -> Vec<String> {
        self.loader.list()
    }

    fn search_paths(&self) -> Vec<PathBuf> {
        self.loader.paths().to_vec()
    }

    fn file_name(&self, name: &str) -> String {
        self.loader.file_name(name)
    }
}

/// In-process runner serving canned modules, for driving the shell in tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::BTreeMap;

    type Handler = Box<dyn FnMut(&[String]) -> Result<Option<ModuleResult>, String>>;

    #[derive(Default)]
    pub(crate) struct StaticRunner {
        modules: BTreeMap<String, Handler>,
        pub calls: Vec<(String, Vec<String>)>,
    }

    impl StaticRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a module computed from its arguments.
        pub fn module(
            mut self,
            name: &str,
            mut f: impl FnMut(&[String]) -> Option<ModuleResult> + 'static,
        ) -> Self {
            self.modules
                .insert(name.to_string(), Box::new(move |args| Ok(f(args))));
            self
        }

        /// Registers a module that always fails with `reason`.
        pub fn failing(mut self, name: &str, reason: &str) -> Self {
            let reason = reason.to_string();
            self.modules
                .insert(name.to_string(), Box::new(move |_| Err(reason.clone())));
            self
        }

        pub fn called(&self) -> Vec<&str> {
            self.calls.iter().map(|(name, _)| name.as_str()).collect()
        }
    }

    impl ModuleRunner for StaticRunner {
        fn find(&self, name: &str) -> Option<PathBuf> {
            self.modules
                .contains_key(name)
                .then(|| PathBuf::from("/modules").join(self.file_name(name)))
        }

        fn invoke(&mut self, name: &str, args: &[String]) -> Result<Option<ModuleResult>, ShellError> {
            let path = self.find(name);
            let handler = self.modules.get_mut(name).ok_or_else(|| ShellError::ModuleNotFound {
                name: name.to_string(),
            })?;
            self.calls.push((name.to_string(), args.to_vec()));
            handler(args).map_err(|reason| ShellError::ExecutionFailed {
                name: name.to_string(),
                path: path.unwrap_or_default(),
                reason,
            })
        }

        fn available(&self) -> Vec<String> {
            self.modules.keys().cloned().collect()
        }

        fn search_paths(&self) -> Vec<PathBuf> {
            vec![PathBuf::from("/modules")]
        }

        fn file_name(&self, name: &str) -> String {
            format!("{name}.py")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::fs;

    fn module_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for (name, body) in files {
            fs::write(dir.path().join(name), body).expect("write module");
        }
        dir
    }

    #[test]
    fn test_find_module_in_search_paths() {
        let first = module_dir(&[("echo.py", "")]);
        let second = module_dir(&[("echo.py", ""), ("sum.py", "")]);
        let loader = ModuleLoader::new(
            vec![first.path().to_path_buf(), second.path().to_path_buf()],
            "py",
        );

        assert_eq!(loader.find_module("echo"), Some(first.path().join("echo.py")));
        assert_eq!(loader.find_module("sum"), Some(second.path().join("sum.py")));
        assert_eq!(loader.find_module("missing_module_xyz"), None);
    }

    #[test]
    fn test_find_module_rejects_paths() {
        let dir = module_dir(&[("a.py", "")]);
        let loader = ModuleLoader::new(vec![dir.path().to_path_buf()], "py");
        assert_eq!(loader.find_module("../a"), None);
        assert_eq!(loader.find_module(""), None);
    }

    #[test]
    fn test_list_modules_by_extension() {
        let dir = module_dir(&[("b.py", ""), ("a.py", ""), ("notes.txt", "")]);
        let loader = ModuleLoader::new(vec![dir.path().to_path_buf()], "py");
        assert_eq!(loader.list(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_output() {
        let res = parse_output(br#"{"output": "hello world", "status": "success"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(res.output, Some(Value::from("hello world")));
        assert!(matches!(parse_output(b"null\n"), Ok(None)));
        assert!(matches!(parse_output(b"[1]"), Err(ModuleFailure::NotAnObject(ref got)) if got == "[1]"));
        assert!(matches!(
            parse_output(b"Traceback (most recent call last)"),
            Err(ModuleFailure::InvalidJson(_))
        ));
        assert!(matches!(parse_output(b""), Err(ModuleFailure::InvalidJson(_))));
    }

    #[test]
    fn test_invoke_unknown_module() {
        let dir = module_dir(&[]);
        let mut runner = ProcessRunner::new(ModuleLoader::new(vec![dir.path().to_path_buf()], "py"), "python3");
        let err = runner.invoke("nope_not_here", &[]).unwrap_err();
        assert!(matches!(err, ShellError::ModuleNotFound { name } if name == "nope_not_here"));
    }

    #[test]
    #[cfg(unix)]
    fn test_invoke_runs_interpreter_with_args() {
        let dir = module_dir(&[(
            "echo.sh",
            "printf '{\"output\": \"%s\", \"status\": \"success\"}' \"$1\"\necho progress >&2\n",
        )]);
        let mut runner = ProcessRunner::new(ModuleLoader::new(vec![dir.path().to_path_buf()], "sh"), "sh");

        let res = runner.invoke("echo", &["hello world".to_string()]).unwrap().unwrap();
        assert_eq!(res.output, Some(Value::from("hello world")));
        assert_eq!(res.status.as_deref(), Some("success"));
    }

    #[test]
    #[cfg(unix)]
    fn test_invoke_reports_failures() {
        let dir = module_dir(&[("bad.sh", "echo not json\n"), ("dies.sh", "exit 3\n")]);
        let mut runner = ProcessRunner::new(ModuleLoader::new(vec![dir.path().to_path_buf()], "sh"), "sh");

        let err = runner.invoke("bad", &[]).unwrap_err();
        assert!(matches!(err, ShellError::ExecutionFailed { ref reason, .. } if reason.starts_with("invalid JSON")));

        let err = runner.invoke("dies", &[]).unwrap_err();
        let ShellError::ExecutionFailed { path, reason, .. } = err else {
            panic!("expected execution failure");
        };
        assert_eq!(path, dir.path().join("dies.sh"));
        assert!(reason.starts_with("module exited with"), "{reason}");
    }

    #[test]
    #[cfg(unix)]
    fn test_invoke_missing_interpreter() {
        let dir = module_dir(&[("x.sh", "")]);
        let mut runner = ProcessRunner::new(
            ModuleLoader::new(vec![dir.path().to_path_buf()], "sh"),
            "/nonexistent/interpreter",
        );
        let err = runner.invoke("x", &[]).unwrap_err();
        assert!(
            matches!(err, ShellError::ExecutionFailed { ref reason, .. } if reason.starts_with("cannot start /nonexistent/interpreter"))
        );
    }
}
