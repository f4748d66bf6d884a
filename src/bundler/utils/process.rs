//! External tool invocation.
//!
//! Every external program the bundler drives (`hdiutil`, `osascript`,
//! `SetFile`, `rsync`, `scp`, `ssh`) goes through [`ToolRunner`], so the
//! call sequence can be observed and simulated without the real tools.

use crate::bundler::error::{Error, Result};
use std::{fmt, future::Future, path::Path};

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program name, resolved through `PATH`
    pub program: String,
    /// Arguments passed verbatim
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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

    /// Appends a path argument, rejecting non-UTF8 paths.
    pub fn path_arg(self, path: &Path) -> Result<Self> {
        let arg = path.to_str().ok_or_else(|| {
            Error::GenericError(format!(
                "Path contains non-UTF8 characters: {}",
                path.display()
            ))
        })?;
        Ok(self.arg(arg))
    }

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
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

    /// Short failure description for error messages.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        match (self.code, stderr.is_empty()) {
            (Some(code), true) => format!("exit code {}", code),
            (Some(code), false) => format!("exit code {}: {}", code, stderr),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => format!("terminated by signal: {}", stderr),
        }
    }
}

/// Runs external tools one at a time and captures their output.
pub trait ToolRunner: Send + Sync {
    /// Runs `command` to completion.
    ///
    /// Returns `Err` only when the program could not be started; a non-zero
    /// exit is reported through [`ToolOutput`].
    fn run(&self, command: &ToolCommand) -> impl Future<Output = Result<ToolOutput>> + Send;
}

/// Runs tools as child processes of this one.
///
/// A child still running when its future is dropped is killed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        log::debug!("Running: {}", command);

        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Tool {
                tool: command.program.clone(),
                reason: format!("failed to execute: {}", e),
            })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs `command` and turns a non-zero exit into [`Error::Tool`].
pub async fn run_checked<R: ToolRunner>(runner: &R, command: &ToolCommand) -> Result<ToolOutput> {
    let output = runner.run(command).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(Error::Tool {
            tool: command.program.clone(),
            reason: output.failure_reason(),
        })
    }
}
