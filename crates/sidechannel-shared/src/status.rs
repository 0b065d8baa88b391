//! Status types reported by the updater.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time copy of the update state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub pending_update: bool,
    pub pending_sha: Option<String>,
    pub applying: bool,
    /// Time of the last check that reached the remote
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Last check or apply failure, cleared by the next successful check
    pub last_error: Option<String>,
}

/// Lifecycle of the polling task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerState {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Stopped => write!(f, "STOPPED"),
            SchedulerState::Running => write!(f, "RUNNING"),
        }
    }
}
