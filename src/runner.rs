/// Child process execution for a single run cycle.
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use serde::Serialize;

/// Exit code reported when the child could not be launched or was killed by a signal.
pub const LAUNCH_FAILED: i32 = -1;

/// Outcome of one script execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    /// Sentinel for a launch failure. Flows through classification like any other failure.
    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self {
            exit_code: LAUNCH_FAILED,
            stdout: String::new(),
            stderr: message.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs scripts through a fixed interpreter and captures their streams.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// `None` executes the script directly.
    interpreter: Option<String>,
}

impl ProcessRunner {
    pub fn new(interpreter: Option<String>) -> Self {
        let interpreter = interpreter.filter(|i| !i.trim().is_empty());
        Self { interpreter }
    }

    pub fn interpreter(&self) -> Option<&str> {
        self.interpreter.as_deref()
    }

    /// Execute `script` with `args`, blocking until the child exits.
    ///
    /// Never fails: a spawn error becomes a [`RunResult::launch_failure`] so one
    /// missing file does not tear down the watch loop.
    pub fn execute(&self, script: &Path, args: &[String]) -> RunResult {
        // The child runs in the script's directory, so a relative path would not resolve.
        let absolute = std::path::absolute(script).unwrap_or_else(|_| script.to_path_buf());
        let script = absolute.as_path();
        let mut command = match &self.interpreter {
            Some(interpreter) => {
                let mut c = Command::new(interpreter);
                c.arg(script);
                c
            }
            None => Command::new(script),
        };
        command.args(args).stdin(Stdio::null());
        if let Some(parent) = script.parent().filter(|p| p.is_dir()) {
            command.current_dir(parent);
        }

        tracing::info!(
            interpreter = self.interpreter.as_deref().unwrap_or("<direct>"),
            script = %script.display(),
            args = ?args,
            "running script"
        );
        let start = Instant::now();

        let output = match command.output() {
            Ok(output) => output,
            Err(err) => {
                let message = self.launch_error_message(script, &err);
                tracing::warn!(error = %err, "script launch failed");
                return RunResult::launch_failure(message);
            }
        };

        let exit_code = output.status.code().unwrap_or(LAUNCH_FAILED);
        tracing::info!(
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "script finished"
        );

        RunResult {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    fn launch_error_message(&self, script: &Path, err: &io::Error) -> String {
        match err.kind() {
            io::ErrorKind::NotFound if !script.exists() => {
                format!("Error: Script not found at '{}'", script.display())
            }
            io::ErrorKind::NotFound => match &self.interpreter {
                Some(interpreter) => format!("Error: interpreter '{interpreter}' not found"),
                None => format!("Error: Script not found at '{}'", script.display()),
            },
            _ => format!("An unexpected error occurred: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sh() -> ProcessRunner {
        ProcessRunner::new(Some("sh".to_string()))
    }

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ok.sh");
        fs::write(&script, "echo hello\nexit 0\n").unwrap();

        let result = sh().execute(&script, &[]);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.stderr.is_empty());
        assert!(result.succeeded());
    }

    #[test]
    fn test_captures_stderr_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        fs::write(
            &script,
            "echo 'ZeroDivisionError: division by zero' >&2\nexit 1\n",
        )
        .unwrap();

        let result = sh().execute(&script, &[]);
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr.trim(), "ZeroDivisionError: division by zero");
    }

    #[test]
    fn test_passes_arguments_through() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("args.sh");
        fs::write(&script, "echo \"$1-$2\"\n").unwrap();

        let result = sh().execute(&script, &["a".to_string(), "b".to_string()]);
        assert_eq!(result.stdout.trim(), "a-b");
    }

    #[test]
    fn test_missing_interpreter_returns_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("x.sh");
        fs::write(&script, "exit 0\n").unwrap();

        let runner = ProcessRunner::new(Some("definitely-not-an-interpreter-7f3a".to_string()));
        let result = runner.execute(&script, &[]);
        assert_eq!(result.exit_code, LAUNCH_FAILED);
        assert!(result.stderr.contains("not found"), "got: {}", result.stderr);
    }

    #[test]
    fn test_missing_direct_script_returns_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("missing.sh");

        let result = ProcessRunner::new(None).execute(&script, &[]);
        assert_eq!(result.exit_code, LAUNCH_FAILED);
        assert!(result.stderr.starts_with("Error: Script not found at"));
    }

    #[test]
    fn test_blank_interpreter_means_direct_execution() {
        assert!(ProcessRunner::new(Some("  ".to_string())).interpreter().is_none());
    }
}
