//! External command execution with timeouts.
//!
//! Every git and package-manager invocation goes through [`CommandRunner`].
//! The production runner spawns the process on the tokio runtime, so a slow
//! subprocess never blocks the polling task or an operator request. There are
//! no retries here; callers decide what a failure means.

use async_trait::async_trait;
use sidechannel_shared::CommandError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one process run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` in `cwd` and return its trimmed stdout.
    ///
    /// A non-zero exit is always an error; exceeding `timeout` fails with
    /// [`CommandError::Timeout`].
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<String, CommandError>;
}

/// Runs real processes via `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run to completion and capture output without judging the exit status
    pub async fn execute(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandResult, CommandError> {
        debug!("Executing: {} {:?} in {}", program, args, cwd.display());

        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            // git must never wait on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(CommandError::Timeout {
                    program: program.to_string(),
                    timeout,
                })
            }
        };

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            // Killed by a signal
            exit_status: output.status.code().unwrap_or(-1),
        })
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<String, CommandError> {
        let result = self.execute(program, args, cwd, timeout).await?;
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(CommandError::Failed {
                program: program.to_string(),
                exit_status: result.exit_status,
                stderr: result.stderr,
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_stdout_is_trimmed() {
        let out = ProcessRunner::new()
            .run("echo", &["  hello  "], Path::new("."), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_with_stderr() {
        let err = ProcessRunner::new()
            .run("sh", &["-c", "echo boom >&2; exit 3"], Path::new("."), TIMEOUT)
            .await
            .unwrap_err();
        match err {
            CommandError::Failed {
                exit_status,
                stderr,
                ..
            } => {
                assert_eq!(exit_status, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_execute_reports_status_without_failing() {
        let result = ProcessRunner::new()
            .execute("sh", &["-c", "echo out; exit 1"], Path::new("."), TIMEOUT)
            .await
            .unwrap();
        assert!(!result.success());
        assert_eq!(result.stdout, "out");
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let err = ProcessRunner::new()
            .run("sleep", &["5"], Path::new("."), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = ProcessRunner::new()
            .run("sidechannel-no-such-binary", &[], Path::new("."), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = ProcessRunner::new()
            .run("pwd", &[], dir.path(), TIMEOUT)
            .await
            .unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(&out).canonicalize().unwrap(), expected);
    }
}
