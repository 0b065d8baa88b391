//! Scripted collaborators for exercising the updater without git, a package
//! manager, a chat transport or a real restart.
//!
//! ```
//! use sidechanneld::testing::{Reply, ScriptedRunner};
//!
//! let runner = ScriptedRunner::new()
//!     .on("git", &["rev-parse", "HEAD"], Reply::ok("abc1234"))
//!     .on("git", &["rev-parse", "origin/main"], Reply::ok("def5678"));
//! assert!(runner.calls().is_empty());
//! ```

use crate::command::CommandRunner;
use crate::notifier::Notifier;
use crate::supervisor::ProcessSupervisor;
use async_trait::async_trait;
use sidechannel_shared::{CommandError, UpdateConfig};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Admin contact used by [`update_config`]
pub const ADMIN: &str = "+15551234567";

/// Enabled config pointing at `repo_dir` with the default admin contact
pub fn update_config(repo_dir: impl Into<PathBuf>) -> UpdateConfig {
    UpdateConfig {
        enabled: true,
        admin_contact: Some(ADMIN.to_string()),
        repo_dir: repo_dir.into(),
        ..UpdateConfig::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Canned answer for a scripted command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(String),
    Fail { exit_status: i32, stderr: String },
    Timeout,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Reply::Ok(stdout.to_string())
    }

    pub fn fail(exit_status: i32, stderr: &str) -> Self {
        Reply::Fail {
            exit_status,
            stderr: stderr.to_string(),
        }
    }
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    pub fn matches(&self, program: &str, args_prefix: &[&str]) -> bool {
        self.program == program
            && self.args.len() >= args_prefix.len()
            && self.args.iter().zip(args_prefix).all(|(a, p)| a == p)
    }
}

#[derive(Debug)]
struct Rule {
    program: String,
    args_prefix: Vec<String>,
    replies: VecDeque<Reply>,
    delay: Option<Duration>,
}

impl Rule {
    fn matches(&self, program: &str, args: &[&str]) -> bool {
        self.program == program
            && args.len() >= self.args_prefix.len()
            && self.args_prefix.iter().zip(args).all(|(p, a)| p == a)
    }

    /// Replies are consumed in order; the last one repeats
    fn next_reply(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or(Reply::Ok(String::new()))
        } else {
            self.replies.front().cloned().unwrap_or(Reply::Ok(String::new()))
        }
    }
}

/// [`CommandRunner`] answering from a script.
///
/// A call matches the rule with the longest argument prefix. Calls without a
/// matching rule succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` for calls starting with `program args_prefix`
    pub fn on(self, program: &str, args_prefix: &[&str], reply: Reply) -> Self {
        self.with_rule(program, args_prefix, |rule| rule.replies.push_back(reply));
        self
    }

    /// Make matching calls take `delay` before replying
    pub fn delayed(self, program: &str, args_prefix: &[&str], delay: Duration) -> Self {
        self.with_rule(program, args_prefix, |rule| rule.delay = Some(delay));
        self
    }

    fn with_rule(&self, program: &str, args_prefix: &[&str], f: impl FnOnce(&mut Rule)) {
        let mut rules = lock(&self.rules);
        let idx = rules
            .iter()
            .position(|r| r.program == program && r.args_prefix == args_prefix);
        let idx = match idx {
            Some(idx) => idx,
            None => {
                rules.push(Rule {
                    program: program.to_string(),
                    args_prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
                    replies: VecDeque::new(),
                    delay: None,
                });
                rules.len() - 1
            }
        };
        f(&mut rules[idx]);
    }

    pub fn calls(&self) -> Vec<Invocation> {
        lock(&self.calls).clone()
    }

    /// Number of calls starting with `program args_prefix`
    pub fn count(&self, program: &str, args_prefix: &[&str]) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.matches(program, args_prefix))
            .count()
    }

    pub fn ran(&self, program: &str, args_prefix: &[&str]) -> bool {
        self.count(program, args_prefix) > 0
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<String, CommandError> {
        lock(&self.calls).push(Invocation {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: cwd.to_path_buf(),
        });

        let (reply, delay) = {
            let mut rules = lock(&self.rules);
            match rules
                .iter_mut()
                .filter(|r| r.matches(program, args))
                .max_by_key(|r| r.args_prefix.len())
            {
                Some(rule) => (rule.next_reply(), rule.delay),
                None => (Reply::Ok(String::new()), None),
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Ok(stdout) => Ok(stdout),
            Reply::Fail {
                exit_status,
                stderr,
            } => Err(CommandError::Failed {
                program: program.to_string(),
                exit_status,
                stderr,
            }),
            Reply::Timeout => Err(CommandError::Timeout {
                program: program.to_string(),
                timeout,
            }),
        }
    }
}

/// [`Notifier`] that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records messages but reports every delivery as failed
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// `(destination, text)` pairs in send order
    pub fn messages(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }

    pub fn texts(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|(_, text)| text.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, destination: &str, text: &str) -> anyhow::Result<()> {
        lock(&self.sent).push((destination.to_string(), text.to_string()));
        if self.fail {
            anyhow::bail!("transport unavailable");
        }
        Ok(())
    }
}

/// [`ProcessSupervisor`] that records restart requests instead of exiting
#[derive(Debug, Default)]
pub struct RecordingSupervisor {
    restarts: Mutex<Vec<Duration>>,
}

impl RecordingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays of every scheduled restart
    pub fn restarts(&self) -> Vec<Duration> {
        lock(&self.restarts).clone()
    }
}

impl ProcessSupervisor for RecordingSupervisor {
    fn schedule_restart(&self, delay: Duration) {
        lock(&self.restarts).push(delay);
    }
}
