//! Shared types for the sidechannel self-updater.

pub mod config;
pub mod error;
pub mod messages;
pub mod outcome;
pub mod status;

pub use config::{Config, UpdateConfig};
pub use error::{CommandError, ConfigError, UpdateError};
pub use outcome::ApplyOutcome;
pub use status::{SchedulerState, UpdateStatus};
