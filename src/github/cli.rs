use crate::errors::Result;
use crate::process::Runner;
use std::path::Path;
use std::time::Duration;

const HELPER_TIMEOUT: Duration = Duration::from_secs(5);

pub fn gh_available(runner: &dyn Runner) -> bool {
    runner.which("gh")
}

/// Find a GitHub token: `GITHUB_TOKEN`, then the `pass` store, then `gh`.
///
/// The helpers get a short timeout so an interactive unlock prompt cannot
/// hang the listing.
pub fn discover_token(runner: &dyn Runner, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(token) = env("GITHUB_TOKEN").filter(|t| !t.trim().is_empty()) {
        log::debug!("using GITHUB_TOKEN");
        return Some(token.trim().to_string());
    }

    let user = env("USER").unwrap_or_default();
    if !user.is_empty() && runner.which("pass") {
        let entry = format!("github/{}-token", user);
        if let Some(token) = helper_output(runner, &["pass", "show", &entry]) {
            log::debug!("using token from pass {}", entry);
            return Some(token);
        }
    }

    if runner.which("gh") {
        if let Some(token) = helper_output(runner, &["gh", "auth", "token"]) {
            log::debug!("using token from gh auth");
            return Some(token);
        }
    }

    log::debug!("no GitHub token found");
    None
}

fn helper_output(runner: &dyn Runner, argv: &[&str]) -> Option<String> {
    let out = runner.run_with_timeout(argv, HELPER_TIMEOUT).ok()?;
    if !out.success() {
        return None;
    }
    out.stdout
        .lines()
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Check out PR `number` into local branch `branch`, replacing it if present.
pub fn checkout_pr(runner: &dyn Runner, number: u64, branch: &str, cwd: Option<&Path>) -> Result<()> {
    log::info!("Checking out PR #{} as {}", number, branch);
    let number = number.to_string();
    runner.run(
        &["gh", "pr", "checkout", &number, "--branch", branch, "--force"],
        cwd,
        true,
    )?;
    Ok(())
}
