//! Background polling task.
//!
//! One task per scheduler: sleep `check_interval`, check, repeat. Stopping
//! cancels the sleep (or a check in progress) immediately. Applies are not
//! run by this task, so stopping never interrupts one.

use crate::updater::Updater;
use sidechannel_shared::SchedulerState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Scheduler {
    updater: Arc<Updater>,
    task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(updater: Arc<Updater>) -> Self {
        Self {
            updater,
            task: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        match &self.task {
            Some(task) if !task.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    /// Start polling unless updates are disabled or nobody would be told.
    ///
    /// Starting a running scheduler is a no-op.
    pub fn start(&mut self) -> SchedulerState {
        if self.task.is_some() {
            debug!("Update scheduler already running");
            return self.state();
        }

        let config = self.updater.config();
        if !config.enabled {
            info!("Auto-update disabled, update scheduler not started");
            return SchedulerState::Stopped;
        }
        if config.admin_contact.is_none() {
            warn!("Auto-update enabled but no admin contact configured, update scheduler not started");
            return SchedulerState::Stopped;
        }

        let interval = config.check_interval;
        self.cancel = CancellationToken::new();
        self.task = Some(tokio::spawn(poll_loop(
            Arc::clone(&self.updater),
            interval,
            self.cancel.clone(),
        )));

        info!(
            "Update scheduler started (branch: {}, every {}s)",
            config.branch,
            interval.as_secs()
        );
        SchedulerState::Running
    }

    /// Cancel the polling task and wait for it to end. Idempotent.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        self.cancel.cancel();
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!("Update scheduler task ended abnormally: {}", e);
            }
        }
        info!("Update scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop(updater: Arc<Updater>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            result = updater.check_for_updates() => match result {
                Ok(true) => debug!("Update pending"),
                Ok(false) => debug!("No update available"),
                Err(e) => warn!(
                    "Update check failed, retrying in {}s: {}",
                    interval.as_secs(),
                    e
                ),
            },
        }
    }
    debug!("Update polling loop exited");
}
