//! The self-updater shared by the polling task and operator requests.

use crate::command::{CommandRunner, ProcessRunner};
use crate::git::Git;
use crate::notifier::{CommandNotifier, LogNotifier, Notifier};
use crate::state::SharedState;
use crate::supervisor::{ExitSupervisor, ProcessSupervisor};
use sidechannel_shared::{UpdateConfig, UpdateStatus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct Updater {
    pub(crate) config: UpdateConfig,
    pub(crate) git: Git,
    pub(crate) runner: Arc<dyn CommandRunner>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) supervisor: Arc<dyn ProcessSupervisor>,
    pub(crate) state: SharedState,
    /// Serializes every command that touches the working copy, so a poll
    /// never fetches while an apply is pulling or resetting.
    pub(crate) repo_lock: Mutex<()>,
}

impl Updater {
    pub fn new(
        config: UpdateConfig,
        runner: Arc<dyn CommandRunner>,
        notifier: Arc<dyn Notifier>,
        supervisor: Arc<dyn ProcessSupervisor>,
    ) -> Self {
        let git = Git::new(Arc::clone(&runner), &config);
        Self {
            config,
            git,
            runner,
            notifier,
            supervisor,
            state: SharedState::new(),
            repo_lock: Mutex::new(()),
        }
    }

    /// Updater wired to real processes, the configured notifier and an
    /// exit-for-restart supervisor
    pub fn from_config(config: UpdateConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
        let notifier: Arc<dyn Notifier> = match &config.notify_command {
            Some(template) => Arc::new(CommandNotifier::new(
                Arc::clone(&runner),
                template.clone(),
                config.repo_dir.clone(),
                config.git_timeout,
            )),
            None => Arc::new(LogNotifier),
        };
        let supervisor = Arc::new(ExitSupervisor::new(config.restart_marker.clone()));
        Self::new(config, runner, notifier, supervisor)
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    pub fn status(&self) -> UpdateStatus {
        self.state.snapshot()
    }

    /// Resolves once no apply (or check) holds the working copy.
    /// Awaited at shutdown so an apply in flight runs to completion.
    pub async fn wait_idle(&self) {
        let _repo = self.repo_lock.lock().await;
    }

    /// Send `text` to the admin contact; failures are logged and swallowed
    pub(crate) async fn notify_admin(&self, text: &str) {
        let Some(admin) = self.config.admin_contact.as_deref() else {
            debug!("No admin contact configured, not sending: {}", text);
            return;
        };
        if let Err(e) = self.notifier.send_message(admin, text).await {
            warn!("Failed to notify {}: {:#}", admin, e);
        }
    }
}
