//! Process execution seam.
//!
//! `Invoker` is the only place a child process is launched. The subprocess
//! implementation runs `nx` with structured args (never a shell), waits for
//! it to exit, and hands back everything it printed. It adds no retries, no
//! argument mutation and no error rewriting.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::error::{BindingError, Result};
use crate::transport::args::ArgVector;

/// Program launched when no explicit executable is configured.
pub const DEFAULT_PROGRAM: &str = "nx";

/// Everything a finished child process reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Process exit code; `-1` when terminated by a signal.
    pub exit_code: i32,
    /// Bytes exactly as written by the child; never re-encoded.
    pub stdout: Vec<u8>,
    /// Diagnostic text. Invalid UTF-8 is replaced, since it is only reported.
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one argument vector to completion.
pub trait Invoker: Send + Sync {
    /// Launch the external program with `args` and block until it exits.
    ///
    /// A non-zero exit is not an error at this level; only a failure to
    /// launch or wait on the process is.
    fn execute(&self, args: &ArgVector) -> Result<CapturedOutput>;
}

impl<T: Invoker + ?Sized> Invoker for &T {
    fn execute(&self, args: &ArgVector) -> Result<CapturedOutput> {
        (**self).execute(args)
    }
}

impl<T: Invoker + ?Sized> Invoker for std::sync::Arc<T> {
    fn execute(&self, args: &ArgVector) -> Result<CapturedOutput> {
        (**self).execute(args)
    }
}

/// Launches the real `nx` executable.
#[derive(Debug, Clone)]
pub struct SubprocessInvoker {
    program: PathBuf,
    /// Resolved env vars (values already extracted from `${VAR}` references)
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

impl SubprocessInvoker {
    /// Invoker for `program`: a bare name looked up by the OS, or a path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Run every child process in `dir`.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }
}

impl Default for SubprocessInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Invoker for SubprocessInvoker {
    fn execute(&self, args: &ArgVector) -> Result<CapturedOutput> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.program);
        cmd.args(args.as_slice());
        cmd.stdin(Stdio::null());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        let output = cmd.output().map_err(|e| BindingError::Launch {
            program: self.program.display().to_string(),
            reason: e.to_string(),
        })?;

        let captured = CapturedOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::info!(
            program = %self.program.display(),
            args = %args,
            exit_code = %captured.exit_code,
            stdout_bytes = captured.stdout.len(),
            duration_ms = %start.elapsed().as_millis(),
            "nx invocation"
        );

        if !captured.stderr.is_empty() {
            tracing::debug!(stderr = %captured.stderr, "nx stderr");
        }

        Ok(captured)
    }
}
