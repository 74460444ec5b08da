use std::collections::HashMap;
use std::ffi::OsString;
use std::process::{Command, ExitStatus, Output, Stdio};

use crate::errors::PandepsError;

/// Builder for constructing and executing external processes.
///
/// Provides a fluent API for setting program, arguments and environment variables.
/// The same builder can run the process synchronously ([`exec`](Self::exec)) or on the tokio
/// runtime ([`exec_async`](Self::exec_async)).
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: OsString,
    args: Vec<OsString>,
    env: HashMap<String, OsString>,
}

impl CommandBuilder {
    /// Create a new builder for the given program.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Human-readable rendering of the command line, for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }

    /// Execute the command and return its output.
    pub fn exec(&self) -> Result<Output, PandepsError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.output().map_err(PandepsError::from)
    }

    /// Run the command attached to the current terminal and return its exit status.
    pub fn status(&self) -> Result<ExitStatus, PandepsError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.status().map_err(PandepsError::from)
    }

    /// Spawn the command on the tokio runtime with captured stdout/stderr.
    ///
    /// Spawning and waiting are separate so callers can retry spawn failures
    /// without re-running a process that already started.
    pub fn spawn_async(&self) -> Result<tokio::process::Child, PandepsError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.spawn().map_err(PandepsError::from)
    }

    /// Execute the command on the tokio runtime and return its output.
    pub async fn exec_async(&self) -> Result<Output, PandepsError> {
        let child = self.spawn_async()?;
        child.wait_with_output().await.map_err(PandepsError::from)
    }
}

/// Render captured stdout and stderr as a single diagnostic block.
pub fn describe_output(output: &Output) -> String {
    format!(
        "STDERR:\n{}STDOUT:\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    )
}
