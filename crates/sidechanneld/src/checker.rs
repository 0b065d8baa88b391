//! Update check: compare the local HEAD with the upstream branch tip and
//! announce each new upstream revision exactly once.

use crate::updater::Updater;
use chrono::Utc;
use sidechannel_shared::messages::{self, short_sha};
use sidechannel_shared::UpdateError;
use tracing::{debug, info, warn};

/// Local and remote revisions differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub local: String,
    pub remote: String,
    /// Informational; `None` when git cannot count (e.g. after a force-push)
    pub commits_ahead: Option<u32>,
    pub subject: Option<String>,
}

impl Updater {
    /// Returns true iff the local revision differs from the remote tip,
    /// whether or not a notification was sent this time.
    ///
    /// Failing to reach the remote leaves the pending state untouched. While
    /// an apply runs, the pending state is reported but not modified.
    pub async fn check_for_updates(&self) -> Result<bool, UpdateError> {
        if let Some(pending) = self.state.read(|s| s.applying.then_some(s.pending_update)) {
            debug!("Update apply in progress, skipping check");
            return Ok(pending);
        }

        let divergence = {
            let _repo = self.repo_lock.lock().await;
            self.inspect_remote().await
        };

        let divergence = match divergence {
            Ok(divergence) => divergence,
            Err(e) => {
                warn!("Update check failed: {}", e);
                self.state.write(|s| s.last_error = Some(e.to_string()));
                return Err(e);
            }
        };

        let now = Utc::now();
        let Some(divergence) = divergence else {
            self.state.write(|s| {
                s.last_checked_at = Some(now);
                s.last_error = None;
                if s.pending_update && !s.applying {
                    info!(
                        "Local revision caught up with {}, clearing pending update",
                        self.git.remote_ref()
                    );
                    s.clear_pending();
                }
            });
            debug!("Already up to date with {}", self.git.remote_ref());
            return Ok(false);
        };

        let announce = self.state.write(|s| {
            s.last_checked_at = Some(now);
            s.last_error = None;
            // The apply that started meanwhile owns the pending fields
            !s.applying && s.record_divergence(&divergence.remote)
        });

        if announce {
            info!(
                "Update available: {} -> {} ({:?} commits ahead)",
                short_sha(&divergence.local),
                short_sha(&divergence.remote),
                divergence.commits_ahead
            );
            let text = messages::update_available(
                &self.config.branch,
                &divergence.remote,
                divergence.commits_ahead,
                divergence.subject.as_deref(),
            );
            self.notify_admin(&text).await;
        } else {
            debug!(
                "Update {} already announced",
                short_sha(&divergence.remote)
            );
        }

        Ok(true)
    }

    async fn inspect_remote(&self) -> Result<Option<Divergence>, UpdateError> {
        self.git.fetch().await.map_err(UpdateError::Check)?;
        let local = self.git.head().await.map_err(UpdateError::Check)?;
        let remote = self.git.remote_tip().await.map_err(UpdateError::Check)?;

        if local == remote {
            return Ok(None);
        }

        let commits_ahead = match self.git.commits_between(&local, &remote).await {
            Ok(count) => count,
            Err(e) => {
                debug!("Could not count commits {}..{}: {}", local, remote, e);
                None
            }
        };
        let subject = match self.git.subject(&remote).await {
            Ok(subject) if !subject.is_empty() => Some(subject),
            Ok(_) => None,
            Err(e) => {
                debug!("Could not read commit message of {}: {}", remote, e);
                None
            }
        };

        Ok(Some(Divergence {
            local,
            remote,
            commits_ahead,
            subject,
        }))
    }
}
