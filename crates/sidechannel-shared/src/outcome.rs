//! Result of an apply request.

use crate::messages::{self, short_sha};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Nothing pending; no command was run
    NoUpdate,
    /// Another apply holds the guard
    AlreadyApplying,
    /// Pull and install succeeded; a restart is scheduled
    Applied { from: String, to: Option<String> },
    /// Failed before anything changed locally
    Failed { reason: String },
    /// Install failed and the working tree was reset to `target`
    RolledBack { target: String, reason: String },
    /// Install failed and the reset failed too
    RollbackFailed {
        target: String,
        reason: String,
        rollback_error: String,
    },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }

    /// Needs someone to log in and fix the deployment by hand
    pub fn needs_intervention(&self) -> bool {
        matches!(self, ApplyOutcome::RollbackFailed { .. })
    }

    pub fn message(&self) -> String {
        match self {
            ApplyOutcome::NoUpdate => messages::NO_UPDATES.to_string(),
            ApplyOutcome::AlreadyApplying => messages::ALREADY_APPLYING.to_string(),
            ApplyOutcome::Applied { from, to: Some(to) } => format!(
                "Update applied: {} -> {}. Restarting.",
                short_sha(from),
                short_sha(to)
            ),
            ApplyOutcome::Applied { from, to: None } => format!(
                "Update applied on top of {}. Restarting.",
                short_sha(from)
            ),
            ApplyOutcome::Failed { reason } => format!("Update failed: {}", reason),
            ApplyOutcome::RolledBack { target, reason } => format!(
                "Update failed and was rolled back to {}: {}",
                short_sha(target),
                reason
            ),
            ApplyOutcome::RollbackFailed {
                target,
                reason,
                rollback_error,
            } => format!(
                "UPDATE ROLLBACK FAILED. {}. Reset to {} also failed: {}. \
                 The deployment needs manual intervention.",
                reason,
                short_sha(target),
                rollback_error
            ),
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
