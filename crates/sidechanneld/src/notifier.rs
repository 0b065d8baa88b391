//! Notification delivery to the admin contact.
//!
//! The chat transport lives outside this crate. The updater only needs
//! `send_message`; delivery failures are logged by the caller and never abort
//! an update.

use crate::command::CommandRunner;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, destination: &str, text: &str) -> anyhow::Result<()>;
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, destination: &str, text: &str) -> anyhow::Result<()> {
        info!("Notification for {}: {}", destination, text);
        Ok(())
    }
}

/// Delivers notifications by running a command template.
///
/// Each argument has `{destination}` and `{text}` substituted, e.g.
/// `["signal-cli", "send", "-m", "{text}", "{destination}"]`.
pub struct CommandNotifier {
    runner: Arc<dyn CommandRunner>,
    template: Vec<String>,
    cwd: PathBuf,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        template: Vec<String>,
        cwd: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            template,
            cwd,
            timeout,
        }
    }

    fn render(&self, destination: &str, text: &str) -> Vec<String> {
        self.template
            .iter()
            .map(|arg| {
                arg.replace("{destination}", destination)
                    .replace("{text}", text)
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn send_message(&self, destination: &str, text: &str) -> anyhow::Result<()> {
        let rendered = self.render(destination, text);
        let Some((program, args)) = rendered.split_first() else {
            anyhow::bail!("notify command is empty");
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        self.runner
            .run(program, &args, &self.cwd, self.timeout)
            .await?;
        debug!("Notification delivered to {} via {}", destination, program);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedRunner};

    fn template() -> Vec<String> {
        ["signal-cli", "send", "-m", "{text}", "{destination}"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_command_notifier_substitutes_arguments() {
        let runner = Arc::new(ScriptedRunner::new());
        let notifier = CommandNotifier::new(
            runner.clone(),
            template(),
            PathBuf::from("/srv/bot"),
            Duration::from_secs(30),
        );

        notifier
            .send_message("+15551234567", "Update available")
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "signal-cli");
        assert_eq!(
            calls[0].args,
            vec!["send", "-m", "Update available", "+15551234567"]
        );
    }

    #[tokio::test]
    async fn test_command_notifier_reports_failure() {
        let runner = Arc::new(
            ScriptedRunner::new().on("signal-cli", &[], Reply::fail(1, "not registered")),
        );
        let notifier = CommandNotifier::new(
            runner,
            template(),
            PathBuf::from("."),
            Duration::from_secs(30),
        );
        assert!(notifier.send_message("+1", "hi").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_template_is_error() {
        let notifier = CommandNotifier::new(
            Arc::new(ScriptedRunner::new()),
            Vec::new(),
            PathBuf::from("."),
            Duration::from_secs(30),
        );
        assert!(notifier.send_message("+1", "hi").await.is_err());
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.send_message("+1", "hi").await.is_ok());
    }
}
