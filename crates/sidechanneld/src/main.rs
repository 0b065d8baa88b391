//! sidechanneld - keeps a deployment in sync with its upstream branch.
//!
//! Polls the upstream branch, tells the admin when a new revision lands, and
//! applies it on request (SIGUSR1 or `sidechanneld apply`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sidechannel_shared::{Config, SchedulerState};
use sidechanneld::{Scheduler, Updater};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sidechanneld", version, about = "Self-updater for the sidechannel bot")]
struct Cli {
    /// Config file (default: $SIDECHANNEL_CONFIG, /etc/sidechannel/config.toml, ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the update scheduler until interrupted (default)
    Run,
    /// Check once and print the update status as JSON
    Check,
    /// Check once and apply a pending update
    Apply,
    /// Show the effective update settings
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let update_config = config
        .update_config()
        .context("Invalid auto_update settings")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(Arc::new(Updater::from_config(update_config))).await,
        Commands::Check => {
            let updater = Updater::from_config(update_config);
            updater.check_for_updates().await?;
            println!("{}", serde_json::to_string_pretty(&updater.status())?);
            Ok(())
        }
        Commands::Apply => {
            let updater = Updater::from_config(update_config);
            updater.check_for_updates().await?;
            let outcome = updater.apply_update().await;
            println!("{}", outcome);
            if outcome.needs_intervention() {
                anyhow::bail!("rollback failed; the deployment needs manual repair");
            }
            Ok(())
        }
        Commands::Status => {
            println!("enabled:        {}", update_config.enabled);
            println!("branch:         {}", update_config.remote_ref());
            println!("interval:       {}s", update_config.check_interval.as_secs());
            println!("repo:           {}", update_config.repo_dir.display());
            println!(
                "admin contact:  {}",
                update_config.admin_contact.as_deref().unwrap_or("(none)")
            );
            println!(
                "scheduler:      {}",
                if update_config.can_schedule() {
                    SchedulerState::Running
                } else {
                    SchedulerState::Stopped
                }
            );
            Ok(())
        }
    }
}

async fn run(updater: Arc<Updater>) -> Result<()> {
    info!("sidechanneld v{} starting", env!("CARGO_PKG_VERSION"));

    let mut scheduler = Scheduler::new(Arc::clone(&updater));
    if scheduler.start() == SchedulerState::Stopped {
        info!("Periodic update checks are off; waiting for shutdown");
    }

    wait_for_shutdown(&updater).await?;

    info!("Shutting down gracefully");
    scheduler.stop().await;
    updater.wait_idle().await;
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM; SIGUSR1 applies the pending update meanwhile
#[cfg(unix)]
async fn wait_for_shutdown(updater: &Arc<Updater>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut apply = signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                return Ok(());
            }
            _ = terminate.recv() => return Ok(()),
            _ = apply.recv() => {
                info!("SIGUSR1 received, applying pending update");
                let updater = Arc::clone(updater);
                tokio::spawn(async move {
                    let outcome = updater.apply_update().await;
                    if outcome.needs_intervention() {
                        warn!("{}", outcome);
                    } else {
                        info!("{}", outcome);
                    }
                });
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_updater: &Arc<Updater>) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}
