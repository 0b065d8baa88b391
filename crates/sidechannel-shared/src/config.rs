//! Configuration for the self-updater.
//!
//! Loads settings from /etc/sidechannel/config.toml (or the path named by
//! `SIDECHANNEL_CONFIG`) or uses defaults. Only the `admin_contact` key and the
//! `[auto_update]` table are read here; the rest of the file belongs to the
//! bot and is ignored.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "SIDECHANNEL_CONFIG";

/// System config file path
pub const CONFIG_PATH: &str = "/etc/sidechannel/config.toml";

/// Fallback config next to the deployment
pub const LOCAL_CONFIG_PATH: &str = "config.toml";

/// `[auto_update]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoUpdateSection {
    /// Periodic checks enabled
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between checks
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Upstream branch to track
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Upstream remote name
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Working copy of the deployment
    #[serde(default = "default_repo_dir")]
    pub repo_dir: PathBuf,

    /// Program and arguments that reinstall dependencies after a pull
    #[serde(default = "default_install_command")]
    pub install_command: Vec<String>,

    /// Per-command timeout for git, in seconds
    #[serde(default = "default_git_timeout")]
    pub git_timeout_secs: u64,

    /// Timeout for the dependency install, in seconds
    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,

    /// Delay between a successful update and the process exit, in seconds
    #[serde(default = "default_restart_delay")]
    pub restart_delay_secs: u64,

    /// File written before exiting for restart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_marker: Option<PathBuf>,

    /// Command template used to deliver notifications.
    /// `{destination}` and `{text}` are substituted in each argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_command: Option<Vec<String>>,
}

fn default_check_interval() -> u64 {
    21_600 // 6 hours
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_repo_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_install_command() -> Vec<String> {
    ["python3", "-m", "pip", "install", "-q", "-r", "requirements.txt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_git_timeout() -> u64 {
    60
}

fn default_install_timeout() -> u64 {
    300
}

fn default_restart_delay() -> u64 {
    2
}

impl Default for AutoUpdateSection {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval: default_check_interval(),
            branch: default_branch(),
            remote: default_remote(),
            repo_dir: default_repo_dir(),
            install_command: default_install_command(),
            git_timeout_secs: default_git_timeout(),
            install_timeout_secs: default_install_timeout(),
            restart_delay_secs: default_restart_delay(),
            restart_marker: None,
            notify_command: None,
        }
    }
}

/// Full configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Sole destination for update notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_contact: Option<String>,

    #[serde(default)]
    pub auto_update: AutoUpdateSection,
}

impl Config {
    pub fn auto_update_enabled(&self) -> bool {
        self.auto_update.enabled
    }

    pub fn auto_update_check_interval(&self) -> u64 {
        self.auto_update.check_interval
    }

    pub fn auto_update_branch(&self) -> &str {
        &self.auto_update.branch
    }

    /// Admin contact, with blank values treated as unset
    pub fn admin_contact(&self) -> Option<&str> {
        self.admin_contact
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Load config.
    ///
    /// An explicit path must exist and parse. Otherwise `SIDECHANNEL_CONFIG`,
    /// the system path and the local path are tried in order, falling back to
    /// defaults when none exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let mut candidates = Vec::new();
        if let Some(env_path) = std::env::var_os(CONFIG_ENV) {
            candidates.push(PathBuf::from(env_path));
        }
        candidates.push(PathBuf::from(CONFIG_PATH));
        candidates.push(PathBuf::from(LOCAL_CONFIG_PATH));

        for path in candidates {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        warn!("Config not found, using defaults (auto-update disabled)");
        Ok(Config::default())
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validated, immutable view used by the updater
    pub fn update_config(&self) -> Result<UpdateConfig, ConfigError> {
        let section = &self.auto_update;

        if section.check_interval == 0 {
            return Err(ConfigError::Invalid(
                "auto_update.check_interval must be greater than zero".to_string(),
            ));
        }
        if section.branch.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auto_update.branch must not be empty".to_string(),
            ));
        }
        if section.remote.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auto_update.remote must not be empty".to_string(),
            ));
        }
        if section.install_command.is_empty() {
            return Err(ConfigError::Invalid(
                "auto_update.install_command must name a program".to_string(),
            ));
        }
        if matches!(&section.notify_command, Some(cmd) if cmd.is_empty()) {
            return Err(ConfigError::Invalid(
                "auto_update.notify_command must name a program".to_string(),
            ));
        }

        Ok(UpdateConfig {
            enabled: section.enabled,
            check_interval: Duration::from_secs(section.check_interval),
            branch: section.branch.trim().to_string(),
            remote: section.remote.trim().to_string(),
            admin_contact: self.admin_contact().map(str::to_string),
            repo_dir: section.repo_dir.clone(),
            install_command: section.install_command.clone(),
            git_timeout: Duration::from_secs(section.git_timeout_secs),
            install_timeout: Duration::from_secs(section.install_timeout_secs),
            restart_delay: Duration::from_secs(section.restart_delay_secs),
            restart_marker: section.restart_marker.clone(),
            notify_command: section.notify_command.clone(),
        })
    }
}

/// Immutable settings handed to the updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    pub enabled: bool,
    pub check_interval: Duration,
    pub branch: String,
    pub remote: String,
    pub admin_contact: Option<String>,
    pub repo_dir: PathBuf,
    pub install_command: Vec<String>,
    pub git_timeout: Duration,
    pub install_timeout: Duration,
    pub restart_delay: Duration,
    pub restart_marker: Option<PathBuf>,
    pub notify_command: Option<Vec<String>>,
}

impl UpdateConfig {
    /// Remote-tracking ref of the upstream branch, e.g. `origin/main`
    pub fn remote_ref(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }

    /// Whether the periodic checker may run with these settings
    pub fn can_schedule(&self) -> bool {
        self.enabled && self.admin_contact.is_some()
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        let section = AutoUpdateSection::default();
        Self {
            enabled: section.enabled,
            check_interval: Duration::from_secs(section.check_interval),
            branch: section.branch,
            remote: section.remote,
            admin_contact: None,
            repo_dir: section.repo_dir,
            install_command: section.install_command,
            git_timeout: Duration::from_secs(section.git_timeout_secs),
            install_timeout: Duration::from_secs(section.install_timeout_secs),
            restart_delay: Duration::from_secs(section.restart_delay_secs),
            restart_marker: None,
            notify_command: None,
        }
    }
}
