//! Applying a pending update: pull, reinstall dependencies, restart.
//!
//! Nothing has changed locally until the pull succeeds, so a failure up to
//! that point needs no rollback. Once the pull has landed, any later failure
//! resets the working tree to the revision recorded before the pull.

use crate::state::ApplyRefusal;
use crate::updater::Updater;
use sidechannel_shared::messages::short_sha;
use sidechannel_shared::{ApplyOutcome, CommandError, UpdateError};
use tracing::{error, info, warn};

impl Updater {
    /// Apply the pending update and report the outcome to the admin.
    ///
    /// With nothing pending this returns [`ApplyOutcome::NoUpdate`] without
    /// running any command. A second call while one is running returns
    /// [`ApplyOutcome::AlreadyApplying`].
    pub async fn apply_update(&self) -> ApplyOutcome {
        let _guard = match self.state.begin_apply() {
            Ok(guard) => guard,
            Err(ApplyRefusal::NothingPending) => {
                info!("Apply requested but no update is pending");
                return ApplyOutcome::NoUpdate;
            }
            Err(ApplyRefusal::AlreadyApplying) => {
                warn!("Apply requested while another apply is running");
                return ApplyOutcome::AlreadyApplying;
            }
        };

        let _repo = self.repo_lock.lock().await;
        let outcome = self.run_apply().await;

        // Report before the restart so the message is not lost with the process
        self.notify_admin(&outcome.message()).await;
        if outcome.is_applied() {
            self.supervisor.schedule_restart(self.config.restart_delay);
        }
        outcome
    }

    async fn run_apply(&self) -> ApplyOutcome {
        let rollback_target = match self.git.head().await {
            Ok(sha) => sha,
            Err(e) => return self.fail_before_change(UpdateError::Revision(e)),
        };

        info!(
            "Applying update from {} on top of {}",
            self.git.remote_ref(),
            short_sha(&rollback_target)
        );

        if let Err(e) = self.git.pull().await {
            return self.fail_before_change(UpdateError::Pull(e));
        }
        info!("Pulled {}", self.git.remote_ref());

        if let Err(e) = self.install_dependencies().await {
            let reason = UpdateError::Install(e).to_string();
            warn!("{}, rolling back to {}", reason, short_sha(&rollback_target));

            return match self.rollback(&rollback_target).await {
                Ok(()) => {
                    self.state.write(|s| {
                        s.clear_pending();
                        s.last_error = Some(reason.clone());
                    });
                    ApplyOutcome::RolledBack {
                        target: rollback_target,
                        reason,
                    }
                }
                Err(rollback_err) => {
                    error!(
                        "ROLLBACK FAILED after {}: {}. Manual intervention required.",
                        reason, rollback_err
                    );
                    let rollback_error = rollback_err.command().to_string();
                    // Pending fields stay as they were for the operator
                    self.state
                        .write(|s| s.last_error = Some(rollback_err.to_string()));
                    ApplyOutcome::RollbackFailed {
                        target: rollback_target,
                        reason,
                        rollback_error,
                    }
                }
            };
        }

        let new_head = self.git.head().await.ok();
        self.state.write(|s| {
            s.clear_pending();
            s.last_error = None;
        });
        info!(
            "Update applied: {} -> {}",
            short_sha(&rollback_target),
            new_head.as_deref().map(short_sha).unwrap_or("unknown")
        );

        ApplyOutcome::Applied {
            from: rollback_target,
            to: new_head,
        }
    }

    fn fail_before_change(&self, err: UpdateError) -> ApplyOutcome {
        warn!("Update aborted before any local change: {}", err);
        let reason = err.to_string();
        self.state.write(|s| s.last_error = Some(reason.clone()));
        ApplyOutcome::Failed { reason }
    }

    async fn install_dependencies(&self) -> Result<(), CommandError> {
        let Some((program, args)) = self.config.install_command.split_first() else {
            warn!("No install command configured, skipping dependency install");
            return Ok(());
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        info!("Reinstalling dependencies with {}", program);
        self.runner
            .run(
                program,
                &args,
                &self.config.repo_dir,
                self.config.install_timeout,
            )
            .await?;
        Ok(())
    }

    /// Hard-reset the working tree to `target_sha`
    async fn rollback(&self, target_sha: &str) -> Result<(), UpdateError> {
        self.git
            .reset_hard(target_sha)
            .await
            .map_err(|source| UpdateError::Rollback {
                target: target_sha.to_string(),
                source,
            })?;
        info!("Rolled back to {}", short_sha(target_sha));
        Ok(())
    }
}
