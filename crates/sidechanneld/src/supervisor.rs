//! Restart after a successful update.
//!
//! The daemon does not re-exec itself. It exits cleanly and the service
//! manager (systemd `Restart=always` or an equivalent watcher) starts the
//! freshly pulled code.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub trait ProcessSupervisor: Send + Sync {
    /// Arrange for the process to be restarted after `delay`.
    /// Must be called from within a tokio runtime.
    fn schedule_restart(&self, delay: Duration);
}

/// Exits the process after a delay, optionally leaving a marker file
#[derive(Debug, Clone, Default)]
pub struct ExitSupervisor {
    marker: Option<PathBuf>,
}

impl ExitSupervisor {
    pub fn new(marker: Option<PathBuf>) -> Self {
        Self { marker }
    }
}

/// Record when the restart was requested
pub fn write_restart_marker(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, chrono::Utc::now().to_rfc3339())
}

impl ProcessSupervisor for ExitSupervisor {
    fn schedule_restart(&self, delay: Duration) {
        if let Some(marker) = &self.marker {
            if let Err(e) = write_restart_marker(marker) {
                warn!("Failed to write restart marker {}: {}", marker.display(), e);
            }
        }

        info!("Restart scheduled in {}s", delay.as_secs());
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("Exiting for restart");
            std::process::exit(0);
        });
    }
}
