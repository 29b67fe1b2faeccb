//! Process runner abstraction
//!
//! Provides a trait for running external commands that can be implemented
//! by the real system (tokio subprocesses) or a scripted fake in tests.

use crate::error::{BuildBotError, BuildBotResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default timeout applied when an invocation does not set one
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// A single external command: program, arguments, working directory and timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute, resolved through `PATH`
    pub program: String,
    /// Arguments passed verbatim
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Kill the process if it runs longer than this
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            cwd: cwd.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable command line for logs and error messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        super::combine_output(&self.stdout, &self.stderr)
    }

    /// Describe how the process ended, e.g. "exit status 2"
    pub fn status_label(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {}", code),
            None => "termination by signal".to_string(),
        }
    }
}

/// Abstract command execution interface
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the command to completion and capture its output.
    ///
    /// A non-zero exit is returned as output, not as an error; errors mean
    /// the command could not be started or exceeded its timeout.
    async fn run(&self, invocation: &Invocation) -> BuildBotResult<CommandOutput>;
}

/// Runs commands as real subprocesses on the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> BuildBotResult<CommandOutput> {
        let command_line = invocation.display();
        debug!(cwd = %invocation.cwd.display(), "Executing: {}", command_line);

        // kill_on_drop reaps the child when the timeout (or a request
        // deadline further up) drops this future.
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildBotError::command_failed(&command_line, e))?;

        let output = tokio::time::timeout(invocation.timeout, child.wait_with_output())
            .await
            .map_err(|_| BuildBotError::CommandTimeout {
                command: command_line.clone(),
                secs: invocation.timeout.as_secs(),
            })?
            .map_err(|e| BuildBotError::command_failed(&command_line, e))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_display() {
        let inv = Invocation::new("git", "/tmp").args(["tag", "-l"]);
        assert_eq!(inv.display(), "git tag -l");
        assert_eq!(Invocation::new("make", "/tmp").display(), "make");
    }

    #[test]
    fn output_status_label() {
        assert_eq!(CommandOutput::failed(2, "").status_label(), "exit status 2");
        let signaled = CommandOutput {
            code: None,
            ..Default::default()
        };
        assert!(!signaled.success());
        assert_eq!(signaled.status_label(), "termination by signal");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_captures_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("sh", dir.path()).args(["-c", "echo out; echo err >&2; exit 3"]);

        let output = SystemRunner::new().run(&inv).await.unwrap();

        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_runner_enforces_timeout() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("sleep", dir.path())
            .arg("5")
            .timeout(Duration::from_millis(100));

        let err = SystemRunner::new().run(&inv).await.unwrap_err();

        assert!(matches!(err, BuildBotError::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn system_runner_reports_missing_program() {
        let dir = tempfile::TempDir::new().unwrap();
        let inv = Invocation::new("brewbot-definitely-not-a-program", dir.path());

        let err = SystemRunner::new().run(&inv).await.unwrap_err();

        assert!(matches!(err, BuildBotError::CommandFailed { .. }));
    }
}
