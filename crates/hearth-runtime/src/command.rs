//! Running external tools: package managers, service managers, installers.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::RuntimeError;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            ..Default::default()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// Turn a non-zero exit into a [`RuntimeError::CommandFailed`].
    pub fn into_result(self, spec: &CommandSpec) -> Result<CommandOutput, RuntimeError> {
        if self.success {
            return Ok(self);
        }
        let detail = self
            .stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim()
            .to_string();
        let message = match self.code {
            Some(code) if detail.is_empty() => format!("exit code {}", code),
            Some(code) => format!("exit code {}: {}", code, detail),
            None => "terminated by signal".to_string(),
        };
        Err(RuntimeError::command_failed(spec.program.clone(), message))
    }
}

/// Process seam used by the installer, supervisor and uninstaller.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion, capturing output. A non-zero exit is `Ok` with `success: false`.
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, RuntimeError>;

    /// Launch as a background process that outlives this one. Returns the PID.
    fn spawn_detached(&self, spec: &CommandSpec) -> Result<u32, RuntimeError>;
}

/// Runs commands on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<CommandOutput, RuntimeError> {
        debug!("Running `{}`", spec);

        let child = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RuntimeError::command_failed(spec.program.clone(), e.to_string()))?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| RuntimeError::CommandTimeout(spec.to_string()))??;

        let result = CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success {
            warn!("`{}` exited with {:?}", spec, result.code);
        }
        Ok(result)
    }

    fn spawn_detached(&self, spec: &CommandSpec) -> Result<u32, RuntimeError> {
        let mut command = std::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // New session so the runtime survives our terminal and signals.
            unsafe {
                command.pre_exec(|| {
                    libc::setsid();
                    Ok(())
                });
            }
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        let mut child = command
            .spawn()
            .map_err(|e| RuntimeError::command_failed(spec.program.clone(), e.to_string()))?;
        let pid = child.id();
        info!("Launched `{}` in background (PID: {})", spec, pid);

        // Reap the child if it exits while we are alive.
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        Ok(pid)
    }
}
