//! Error types for the self-updater.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single external command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {exit_status}: {stderr}")]
    Failed {
        program: String,
        exit_status: i32,
        stderr: String,
    },

    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

impl CommandError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::Timeout { .. })
    }

    /// Exit status of the process, if it ran to completion.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            CommandError::Failed { exit_status, .. } => Some(*exit_status),
            _ => None,
        }
    }
}

/// Failure of one step of the check or apply sequence.
///
/// Each variant carries the command failure that caused it. A timeout is
/// reported as the failure of the step it interrupted.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("could not check remote for updates: {0}")]
    Check(#[source] CommandError),

    #[error("could not read local revision: {0}")]
    Revision(#[source] CommandError),

    #[error("git pull failed: {0}")]
    Pull(#[source] CommandError),

    #[error("dependency install failed: {0}")]
    Install(#[source] CommandError),

    #[error("rollback to {target} failed: {source}")]
    Rollback {
        target: String,
        #[source]
        source: CommandError,
    },
}

impl UpdateError {
    /// The command failure underneath this step.
    pub fn command(&self) -> &CommandError {
        match self {
            UpdateError::Check(e)
            | UpdateError::Revision(e)
            | UpdateError::Pull(e)
            | UpdateError::Install(e) => e,
            UpdateError::Rollback { source, .. } => source,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_and_kind() {
        let err = CommandError::Timeout {
            program: "git".to_string(),
            timeout: Duration::from_secs(60),
        };
        assert!(err.is_timeout());
        assert_eq!(err.exit_status(), None);
        assert_eq!(err.to_string(), "git timed out after 60s");
    }

    #[test]
    fn test_step_error_keeps_command_failure() {
        let err = UpdateError::Pull(CommandError::Failed {
            program: "git".to_string(),
            exit_status: 1,
            stderr: "merge conflict".to_string(),
        });
        assert_eq!(err.command().exit_status(), Some(1));
        assert!(err.to_string().starts_with("git pull failed"));
        assert!(err.to_string().contains("merge conflict"));
    }

    #[test]
    fn test_rollback_error_names_target() {
        let err = UpdateError::Rollback {
            target: "abc1234".to_string(),
            source: CommandError::Failed {
                program: "git".to_string(),
                exit_status: 128,
                stderr: "fatal: index.lock exists".to_string(),
            },
        };
        assert!(err.to_string().contains("rollback to abc1234 failed"));
    }
}
