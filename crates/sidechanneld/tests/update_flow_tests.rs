//! End-to-end update flow tests.
//!
//! The scripted tests drive check -> apply through the public API. The git
//! tests build a throwaway upstream repository and deployment clone with
//! tempfile and run the real `git` binary; they are skipped when git is not
//! installed.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p sidechanneld --test update_flow_tests
//! ```

use sidechannel_shared::ApplyOutcome;
use sidechanneld::testing::{self, RecordingNotifier, RecordingSupervisor, Reply, ScriptedRunner};
use sidechanneld::{ProcessRunner, Updater};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Scripted flow
// ============================================================================

#[tokio::test]
async fn test_check_then_apply_then_recheck() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("git", &["fetch"], Reply::ok(""))
            .on("git", &["rev-parse", "HEAD"], Reply::ok("abc1234"))
            // After the pull the deployment is at the remote tip
            .on("git", &["rev-parse", "HEAD"], Reply::ok("abc1234"))
            .on("git", &["rev-parse", "HEAD"], Reply::ok("def5678"))
            .on("git", &["rev-parse", "origin/main"], Reply::ok("def5678"))
            .on("git", &["rev-list", "--count"], Reply::ok("3"))
            .on("git", &["log", "-1"], Reply::ok("feat: add cool thing")),
    );
    let notifier = Arc::new(RecordingNotifier::new());
    let supervisor = Arc::new(RecordingSupervisor::new());
    let updater = Updater::new(
        testing::update_config("/fake/repo"),
        runner.clone(),
        notifier.clone(),
        supervisor.clone(),
    );

    assert!(updater.check_for_updates().await.unwrap());
    assert_eq!(updater.status().pending_sha.as_deref(), Some("def5678"));

    let outcome = updater.apply_update().await;
    assert_eq!(
        outcome,
        ApplyOutcome::Applied {
            from: "abc1234".to_string(),
            to: Some("def5678".to_string()),
        }
    );
    assert_eq!(supervisor.restarts().len(), 1);

    // Up to date now
    assert!(!updater.check_for_updates().await.unwrap());
    assert!(!updater.status().pending_update);

    let texts = notifier.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("Update available"));
    assert!(texts[1].contains("Update applied"));
}

#[tokio::test]
async fn test_rollback_then_redetect_announces_again() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .on("git", &["rev-parse", "HEAD"], Reply::ok("abc1234"))
            .on("git", &["rev-parse", "origin/main"], Reply::ok("def5678"))
            .on("python3", &[], Reply::fail(1, "ResolutionImpossible")),
    );
    let notifier = Arc::new(RecordingNotifier::new());
    let updater = Updater::new(
        testing::update_config("/fake/repo"),
        runner.clone(),
        notifier.clone(),
        Arc::new(RecordingSupervisor::new()),
    );

    updater.check_for_updates().await.unwrap();
    let outcome = updater.apply_update().await;
    assert!(matches!(outcome, ApplyOutcome::RolledBack { .. }));
    assert!(runner.ran("git", &["reset", "--hard", "abc1234"]));
    assert!(!updater.status().pending_update);

    // The same upstream revision is pending again after the rollback
    assert!(updater.check_for_updates().await.unwrap());
    assert_eq!(notifier.texts().len(), 3);
}

// ============================================================================
// Real git
// ============================================================================

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Upstream bare repo, a developer clone that pushes, and the deployment clone
struct Fixture {
    _root: TempDir,
    dev: std::path::PathBuf,
    deploy: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let upstream = root.path().join("upstream.git");
        let dev = root.path().join("dev");
        let deploy = root.path().join("deploy");

        git(root.path(), &["init", "--bare", upstream.to_str().unwrap()]);
        std::fs::create_dir_all(&dev).unwrap();
        git(&dev, &["init"]);
        std::fs::write(dev.join("requirements.txt"), "requests==2.31.0\n").unwrap();
        git(&dev, &["add", "."]);
        git(&dev, &["commit", "-m", "initial"]);
        git(&dev, &["branch", "-M", "main"]);
        git(&dev, &["remote", "add", "origin", upstream.to_str().unwrap()]);
        git(&dev, &["push", "origin", "main"]);

        git(
            root.path(),
            &["clone", "-b", "main", upstream.to_str().unwrap(), deploy.to_str().unwrap()],
        );

        Self {
            _root: root,
            dev,
            deploy,
        }
    }

    fn push_commit(&self, message: &str) -> String {
        std::fs::write(self.dev.join("requirements.txt"), format!("# {}\n", message)).unwrap();
        git(&self.dev, &["commit", "-am", message]);
        git(&self.dev, &["push", "origin", "main"]);
        git(&self.dev, &["rev-parse", "HEAD"])
    }

    fn deploy_head(&self) -> String {
        git(&self.deploy, &["rev-parse", "HEAD"])
    }

    fn updater(&self, install_command: &[&str]) -> (Updater, Arc<RecordingSupervisor>) {
        let mut config = testing::update_config(&self.deploy);
        config.install_command = install_command.iter().map(|s| s.to_string()).collect();
        let supervisor = Arc::new(RecordingSupervisor::new());
        let updater = Updater::new(
            config,
            Arc::new(ProcessRunner::new()),
            Arc::new(RecordingNotifier::new()),
            supervisor.clone(),
        );
        (updater, supervisor)
    }
}

#[tokio::test]
async fn test_real_git_up_to_date() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let fixture = Fixture::new();
    let (updater, _) = fixture.updater(&["true"]);

    assert!(!updater.check_for_updates().await.unwrap());
}

#[tokio::test]
async fn test_real_git_apply_moves_to_remote_tip() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let fixture = Fixture::new();
    let tip = fixture.push_commit("feat: add cool thing");
    let (updater, supervisor) = fixture.updater(&["true"]);

    assert!(updater.check_for_updates().await.unwrap());
    assert_eq!(updater.status().pending_sha.as_deref(), Some(tip.as_str()));

    let outcome = updater.apply_update().await;
    assert!(outcome.is_applied(), "{}", outcome);
    assert_eq!(fixture.deploy_head(), tip);
    assert_eq!(supervisor.restarts().len(), 1);
}

#[tokio::test]
async fn test_real_git_install_failure_restores_revision() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let fixture = Fixture::new();
    let before = fixture.deploy_head();
    fixture.push_commit("feat: needs a new dependency");
    let (updater, supervisor) = fixture.updater(&["false"]);

    assert!(updater.check_for_updates().await.unwrap());
    let outcome = updater.apply_update().await;

    assert!(outcome.to_string().to_lowercase().contains("rolled back"), "{}", outcome);
    assert_eq!(fixture.deploy_head(), before);
    assert!(supervisor.restarts().is_empty());
    assert!(!updater.status().pending_update);
}

#[tokio::test]
async fn test_real_git_unreachable_remote_is_check_error() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let fixture = Fixture::new();
    git(
        &fixture.deploy,
        &["remote", "set-url", "origin", "/nonexistent/upstream.git"],
    );
    let (updater, _) = fixture.updater(&["true"]);

    assert!(updater.check_for_updates().await.is_err());
    assert!(!updater.status().pending_update);
}
