//! Version-control verbs used by the checker and applier.

use crate::command::CommandRunner;
use sidechannel_shared::{CommandError, UpdateConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Git working copy of the deployment and its upstream branch.
#[derive(Clone)]
pub struct Git {
    runner: Arc<dyn CommandRunner>,
    repo_dir: PathBuf,
    remote: String,
    branch: String,
    timeout: Duration,
}

impl Git {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &UpdateConfig) -> Self {
        Self {
            runner,
            repo_dir: config.repo_dir.clone(),
            remote: config.remote.clone(),
            branch: config.branch.clone(),
            timeout: config.git_timeout,
        }
    }

    /// `origin/main` style ref of the upstream tip
    pub fn remote_ref(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }

    async fn git(&self, args: &[&str]) -> Result<String, CommandError> {
        self.runner
            .run("git", args, &self.repo_dir, self.timeout)
            .await
    }

    /// Update the remote-tracking ref of the configured branch
    pub async fn fetch(&self) -> Result<(), CommandError> {
        self.git(&["fetch", &self.remote, &self.branch]).await?;
        Ok(())
    }

    /// Local HEAD revision
    pub async fn head(&self) -> Result<String, CommandError> {
        self.git(&["rev-parse", "HEAD"]).await
    }

    /// Revision of the remote-tracking branch tip
    pub async fn remote_tip(&self) -> Result<String, CommandError> {
        self.git(&["rev-parse", &self.remote_ref()]).await
    }

    /// Commits reachable from `to` but not `from`.
    ///
    /// `Ok(None)` when git answers with something that is not a count.
    pub async fn commits_between(&self, from: &str, to: &str) -> Result<Option<u32>, CommandError> {
        let range = format!("{}..{}", from, to);
        let out = self.git(&["rev-list", "--count", &range]).await?;
        Ok(out.trim().parse().ok())
    }

    /// Subject line of `rev`
    pub async fn subject(&self, rev: &str) -> Result<String, CommandError> {
        self.git(&["log", "-1", "--format=%s", rev]).await
    }

    pub async fn pull(&self) -> Result<(), CommandError> {
        self.git(&["pull", &self.remote, &self.branch]).await?;
        Ok(())
    }

    /// Discard working-tree changes and move HEAD to `rev`
    pub async fn reset_hard(&self, rev: &str) -> Result<(), CommandError> {
        self.git(&["reset", "--hard", rev]).await?;
        Ok(())
    }
}
