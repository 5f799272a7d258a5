//! SafeCommandExecutor: allow-listed execution of external release tools
//!
//! # Security Features
//!
//! - **Allow-list validation**: only known tools and scripts inside the
//!   configured scripts directory can execute
//! - **Injection prevention**: arguments are passed as a vector to
//!   `tokio::process::Command`, never through a shell
//! - **Timeout control**: every command is bounded and killed on expiry
//! - **Secret handling**: tokens are injected as environment variables from
//!   `SecretString`s and never appear in logged command lines
//!
//! # Example
//!
//! ```rust,no_run
//! use release_publisher::security::{CommandRunner, CommandSpec, SafeCommandExecutor};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let executor = SafeCommandExecutor::new(".", "py-release", Duration::from_secs(30))?;
//! let output = executor.run(&CommandSpec::new("git").arg("status")).await?;
//! println!("{}", output.stdout);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Tools the orchestrator may invoke directly.
const ALLOWED_COMMANDS: &[&str] = &["poetry", "gh", "git"];

/// Lines of stderr kept when summarizing a failure
const STDERR_TAIL_LINES: usize = 12;

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is neither allow-listed nor inside the scripts directory
    #[error("Command '{0}' is not in the allowed list")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command could not be started (binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// One external command invocation
#[derive(Debug)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory relative to the executor's root, if not the root
    pub cwd: Option<PathBuf>,
    /// Environment variables carrying credentials
    pub secret_env: Vec<(String, SecretString)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            secret_env: Vec::new(),
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

    pub fn secret_env(mut self, key: impl Into<String>, value: SecretString) -> Self {
        self.secret_env.push((key.into(), value));
        self
    }

    /// Command line for logs; secrets are never part of it
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Short failure description: exit status plus the tail of stderr
    pub fn failure_summary(&self) -> String {
        let status = match self.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };

        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source.trim_end().lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");

        if tail.is_empty() {
            status
        } else {
            format!("{}\n{}", status, tail)
        }
    }
}

/// Seam through which every external tool is invoked
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;

    /// Locate a program on `PATH`
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// Safe command executor with allow-list, working directory and timeout
#[derive(Debug)]
pub struct SafeCommandExecutor {
    /// Directory commands run in (the project root)
    working_dir: PathBuf,
    /// Scripts under this directory may run in addition to the allow-list
    scripts_dir: PathBuf,
    timeout: Duration,
}

impl SafeCommandExecutor {
    /// Create an executor rooted at `working_dir`
    ///
    /// `scripts_dir` is resolved against `working_dir` when relative.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>, S: AsRef<Path>>(
        working_dir: P,
        scripts_dir: S,
        timeout: Duration,
    ) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        let scripts_dir = working_dir.join(scripts_dir);

        Ok(Self {
            working_dir,
            scripts_dir,
            timeout,
        })
    }

    fn is_allowed(&self, program: &str) -> bool {
        if ALLOWED_COMMANDS.contains(&program) {
            return true;
        }

        let path = Path::new(program);
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        };
        // Reject `..` escapes out of the scripts directory
        !path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
            && resolved.starts_with(&self.scripts_dir)
    }

    /// Program to spawn and the arguments placed before `spec.args`
    ///
    /// Allow-listed tools resolve through `PATH`. A script checked in without
    /// the executable bit runs through `sh` and its mode is left untouched.
    fn invocation(&self, spec: &CommandSpec) -> Result<(PathBuf, Vec<String>), CommandError> {
        if ALLOWED_COMMANDS.contains(&spec.program.as_str()) {
            return Ok((PathBuf::from(&spec.program), Vec::new()));
        }

        let path = self.working_dir.join(&spec.program);
        let metadata = std::fs::metadata(&path)
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", path.display(), e)))?;
        if is_executable(&metadata) {
            Ok((path, Vec::new()))
        } else {
            tracing::debug!("{} is not executable, running it with sh", path.display());
            Ok((PathBuf::from("sh"), vec![path.to_string_lossy().into_owned()]))
        }
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

#[async_trait]
impl CommandRunner for SafeCommandExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        if !self.is_allowed(&spec.program) {
            return Err(CommandError::CommandNotAllowed(spec.program.clone()));
        }
        let (program, leading_args) = self.invocation(spec)?;
        let cwd = match &spec.cwd {
            Some(dir) => self.working_dir.join(dir),
            None => self.working_dir.clone(),
        };

        tracing::info!("running: {}", spec.display());

        let mut command = Command::new(&program);
        command
            .args(&leading_args)
            .args(&spec.args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in &spec.secret_env {
            command.env(key, value.expose_secret());
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| CommandError::Timeout(self.timeout))?
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", spec.program, e)))?;

        let output = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(
            status = ?output.status,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "finished: {}",
            spec.program
        );

        Ok(output)
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}
