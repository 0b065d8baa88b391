//! Operator-facing texts.

/// Reply when apply is requested with nothing pending
pub const NO_UPDATES: &str = "No updates available.";

/// Reply when apply is requested while another apply runs
pub const ALREADY_APPLYING: &str = "An update is already being applied.";

/// Abbreviate a revision for display
pub fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Alert sent once per newly observed remote revision
pub fn update_available(
    branch: &str,
    remote_sha: &str,
    commits_ahead: Option<u32>,
    subject: Option<&str>,
) -> String {
    let commits = match commits_ahead {
        Some(1) => "1 new commit".to_string(),
        Some(n) => format!("{} new commits", n),
        None => "new commits".to_string(),
    };

    let mut text = format!(
        "Update available on {}: {} ({})",
        branch,
        short_sha(remote_sha),
        commits
    );
    if let Some(subject) = subject {
        text.push_str(&format!("\nLatest: {}", subject));
    }
    text.push_str("\nSend the update command to apply it.");
    text
}
