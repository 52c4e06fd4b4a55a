use crate::errors::Result;
use crate::git;
use crate::github::PullRequestSummary;
use crate::jira;
use crate::render::{
    ci_icon, format_epoch, osc8, pr_icon, truncate_display, ICON_AHEAD, ICON_BEHIND, ICON_BRANCH,
    ICON_CHANGES, ICON_TRACKING,
};
use crate::session::Session;
use crate::worktrees;
use std::path::Path;

/// fzf preview for a local or remote branch.
pub fn branch(session: &mut Session, reference: &str) -> Result<i32> {
    println!("{}", render_branch(session, reference));
    Ok(0)
}

pub fn render_branch(session: &mut Session, reference: &str) -> String {
    let branch = session.normalize_ref_to_branch(reference);
    let current = git::current_branch(session.runner());
    let is_current = !current.is_empty() && current == reference;
    let c = session.colors.clone();

    let mut sections = Vec::new();
    let mut header = format!("{} {}{}{}", ICON_BRANCH, c.bold, reference, c.reset);
    if is_current {
        header.push_str(&format!(" {}(current){}", c.green, c.reset));
    }
    sections.push(header);

    if let Some(t) = git::tracking(session.runner(), reference, None) {
        sections.push(format!(
            "{} Tracking: {}  {} {}  {} {}",
            ICON_TRACKING, t.upstream, ICON_AHEAD, t.ahead, ICON_BEHIND, t.behind
        ));
    }

    if is_current {
        let counts = git::status_counts(session.runner(), None);
        if counts.is_dirty() {
            sections.push(format!(
                "{} Changes: {}staged {}{}  {}unstaged {}{}  {}untracked {}{}",
                ICON_CHANGES,
                c.green,
                counts.staged,
                c.reset,
                c.yellow,
                counts.unstaged,
                c.reset,
                c.red,
                counts.untracked,
                c.reset
            ));
        }
    }

    if session.flags.online() {
        if let Some(pr) = session.pr_detail(reference) {
            sections.push(pr_section(session, &pr));
        }
    }

    let decoration = git::decoration(session.runner(), reference, None);
    if !decoration.is_empty() {
        sections.push(format!("Refs: {}", decoration));
    }

    let commits = recent_commits(session, reference);
    if !commits.is_empty() {
        sections.push(format!("Recent commits:\n{}", commits));
    }

    if session.settings.jira_enabled {
        if let Some(ticket) = jira::ticket_for_branch(&session.settings.jira_pattern, &branch) {
            sections.push(jira::format_section(
                session.runner(),
                &session.settings.jira_url,
                &ticket,
            ));
        }
    }

    sections.join("\n\n")
}

/// Commits not on `origin/<base>` when an `origin` remote exists, otherwise
/// the branch history.
fn recent_commits(session: &Session, reference: &str) -> String {
    let has_origin = session.remotes().iter().any(|r| r == "origin");
    let mut range = reference.to_string();
    if has_origin {
        range = format!("origin/{}..{}", session.settings.base_branch, reference);
    }
    let mut log = log_oneline(session, &range, None);
    if log.is_empty() && range != reference {
        log = log_oneline(session, reference, None);
    }
    log
}

fn log_oneline(session: &Session, rev: &str, cwd: Option<&Path>) -> String {
    let count = format!("-{}", session.settings.preview_commits);
    let color = if session.colors.enabled() {
        "--color=always"
    } else {
        "--color=never"
    };
    session
        .runner()
        .run(&["git", "log", "--oneline", &count, color, rev], cwd, false)
        .ok()
        .filter(|out| out.success())
        .map(|out| out.stdout.trim_end().to_string())
        .unwrap_or_default()
}

/// PR block: state, linked number and title, labels, reviewers, reviews, the
/// CI result for the head commit and the start of the description.
pub fn pr_section(session: &mut Session, pr: &PullRequestSummary) -> String {
    let c = session.colors.clone();
    let (icon, label) = pr_icon(pr, &c);
    let number = format!("#{}", pr.number);
    let number = match pr.url() {
        Some(url) if c.enabled() => osc8(&url, &number),
        _ => number,
    };

    let mut lines = vec![format!(
        "{} {} {} {}{}{}",
        icon, label, number, c.bold, pr.title, c.reset
    )];
    if !pr.labels.is_empty() {
        lines.push(format!("Labels: {}", pr.labels.join(", ")));
    }
    if !pr.requested_reviewers.is_empty() {
        lines.push(format!("Reviewers: {}", pr.requested_reviewers.join(", ")));
    }
    if !pr.latest_reviews.is_empty() {
        let reviews: Vec<String> = pr
            .latest_reviews
            .iter()
            .map(|(who, state)| format!("{} ({})", who, state.to_lowercase()))
            .collect();
        lines.push(format!("Reviews: {}", reviews.join(", ")));
    }

    if !pr.head_sha.is_empty() {
        let run = session
            .peek_checks(&pr.head_sha)
            .or_else(|| session.fetch_checks(&pr.head_sha));
        if let Some(run) = run {
            let (icon, label) = ci_icon(&run, &c);
            let label = match &run.html_url {
                Some(url) if c.enabled() => osc8(url, &label),
                _ => label,
            };
            lines.push(format!("CI: {} {}", icon, label));
        }
    }

    let body = pr.body.trim();
    if !body.is_empty() {
        let limit = session.settings.preview_columns * 3;
        lines.push(String::new());
        lines.push(truncate_display(body, limit));
    }
    lines.join("\n")
}

/// fzf preview for a worktree directory.
pub fn worktree(session: &mut Session, path: &Path) -> Result<i32> {
    println!("{}", render_worktree(session, path));
    Ok(0)
}

pub fn render_worktree(session: &mut Session, path: &Path) -> String {
    let c = session.colors.clone();
    let runner = session.runner();
    let branch = worktrees::branch_at(runner, path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut summary = vec![format!(
        "{} {}{}{}  [{}]",
        ICON_BRANCH,
        c.bold,
        name,
        c.reset,
        branch.as_deref().unwrap_or("detached")
    )];
    summary.push(format!("{}{}{}", c.grey, path.display(), c.reset));
    if let Some(commit) = git::head_commit(runner, Some(path)) {
        summary.push(format!(
            "{}{}{} {} ({})",
            c.commit,
            commit.short_sha,
            c.reset,
            commit.subject,
            format_epoch(commit.epoch, "%Y-%m-%d %H:%M")
        ));
    }
    if let Some(t) = git::tracking(runner, "HEAD", Some(path)) {
        summary.push(format!(
            "{} {}  {} {}  {} {}",
            ICON_TRACKING, t.upstream, ICON_AHEAD, t.ahead, ICON_BEHIND, t.behind
        ));
    }
    let counts = git::status_counts(runner, Some(path));
    if counts.is_dirty() {
        summary.push(format!(
            "{} staged {}  unstaged {}  untracked {}",
            ICON_CHANGES, counts.staged, counts.unstaged, counts.untracked
        ));
    }

    let mut sections = vec![summary.join("\n")];

    if let Some(branch) = &branch {
        if session.flags.online() {
            if let Some(pr) = session.pr_detail(branch) {
                sections.push(pr_section(session, &pr));
            }
        }
    }

    let log = log_oneline(session, "HEAD", Some(path));
    if !log.is_empty() {
        sections.push(format!("Recent commits:\n{}", log));
    }
    if let Some(diff) = diff_section(session, path, true) {
        sections.push(format!("Staged changes:\n{}", diff));
    }
    if let Some(diff) = diff_section(session, path, false) {
        sections.push(format!("Unstaged changes:\n{}", diff));
    }

    let separator = "─".repeat(session.settings.preview_columns);
    sections.join(&format!("\n{}\n", separator))
}

fn diff_section(session: &Session, path: &Path, staged: bool) -> Option<String> {
    let runner = session.runner();
    let mut argv = vec!["git", "diff"];
    if staged {
        argv.push("--cached");
    }
    argv.push(if session.colors.enabled() {
        "--color=always"
    } else {
        "--color=never"
    });
    let out = runner.run(&argv, Some(path), false).ok()?;
    if !out.success() || out.stdout.trim().is_empty() {
        return None;
    }
    if runner.which("delta") {
        let width = format!("--width={}", session.settings.preview_columns);
        if let Ok(rendered) = runner.pipe(&["delta", "--paging=never", &width], &out.stdout) {
            if rendered.success() && !rendered.stdout.trim().is_empty() {
                return Some(rendered.stdout.trim_end().to_string());
            }
        }
    }
    Some(out.stdout.trim_end().to_string())
}

/// Open the pull request of `reference` in the browser.
pub fn open(session: &mut Session, reference: &str) -> Result<i32> {
    let Some(pr) = session.lookup_pr(reference) else {
        eprintln!(
            "No pull request found for {}",
            session.normalize_ref_to_branch(reference)
        );
        return Ok(1);
    };
    let url = match (pr.url(), session.base_repo()) {
        (Some(url), _) => url,
        (None, Some(base)) => format!("{}/pull/{}", base.web_url(), pr.number),
        (None, None) => return Ok(1),
    };
    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    log::debug!("opening {}", url);
    session.runner().run(&[opener, &url], None, false)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fzf::mock::MockPrompter;
    use crate::github::api::mock::MockApi;
    use crate::process::mock::MockRunner;
    use crate::session::testing;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    fn branch_runner() -> MockRunner {
        MockRunner::new()
            .respond("git remote", "origin\n")
            .respond("git remote get-url origin", "git@github.com:o/r.git\n")
            .respond("git symbolic-ref", "feature/SRVKP-42-login\n")
            .respond(
                "git rev-parse --abbrev-ref --symbolic-full-name feature/SRVKP-42-login@{u}",
                "origin/feature/SRVKP-42-login\n",
            )
            .respond("git rev-list --count origin/feature/SRVKP-42-login..", "2\n")
            .respond("git rev-list --count feature/SRVKP-42-login..", "0\n")
            .respond("git status --porcelain", "M  a.rs\n?? b.rs\n")
            .respond("git log -1 --format=%D", "HEAD -> feature/SRVKP-42-login\n")
            .respond(
                "git log --oneline -10 --color=never origin/main..feature/SRVKP-42-login",
                "abc1234 feat: login\n",
            )
    }

    #[test]
    fn test_branch_preview_offline_sections() {
        let runner = Rc::new(branch_runner());
        let api = Rc::new(MockApi::new());
        let prompter = Rc::new(MockPrompter::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&runner, &api, &prompter, dir.path());
        session.flags.apply_fast();

        let out = render_branch(&mut session, "feature/SRVKP-42-login");
        let sections: Vec<&str> = out.split("\n\n").collect();
        assert!(sections[0].ends_with("feature/SRVKP-42-login (current)"));
        assert!(sections[1].contains("Tracking: origin/feature/SRVKP-42-login"));
        assert!(sections[1].contains(&format!("{} 2", ICON_AHEAD)));
        assert!(sections[2].contains("staged 1") && sections[2].contains("untracked 1"));
        assert_eq!(sections[3], "Refs: HEAD -> feature/SRVKP-42-login");
        assert_eq!(sections[4], "Recent commits:\nabc1234 feat: login");
        assert!(sections[5].contains("https://issues.redhat.com/browse/SRVKP-42"));
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn test_branch_preview_falls_back_to_branch_log() {
        let runner = Rc::new(
            MockRunner::new()
                .respond("git remote", "origin\n")
                .respond("git log --oneline -10 --color=never topic", "def5678 fix: thing\n"),
        );
        let api = Rc::new(MockApi::new());
        let prompter = Rc::new(MockPrompter::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&runner, &api, &prompter, dir.path());
        session.flags.apply_fast();
        session.settings.jira_enabled = false;

        let out = render_branch(&mut session, "topic");
        assert!(out.ends_with("Recent commits:\ndef5678 fix: thing"));
        assert!(runner.called("git log --oneline -10 --color=never origin/main..topic"));
    }

    #[test]
    fn test_pr_section_fields() {
        let runner = Rc::new(MockRunner::new());
        let api = Rc::new(MockApi::new());
        let prompter = Rc::new(MockPrompter::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&runner, &api, &prompter, dir.path());
        session.settings.preview_columns = 10;

        let pr = PullRequestSummary {
            number: 12,
            title: "Add login".to_string(),
            labels: vec!["bug".to_string(), "ui".to_string()],
            requested_reviewers: vec!["alice".to_string()],
            latest_reviews: BTreeMap::from([("bob".to_string(), "APPROVED".to_string())]),
            body: "x".repeat(50),
            ..PullRequestSummary::default()
        };
        let section = pr_section(&mut session, &pr);
        let lines: Vec<&str> = section.lines().collect();
        assert!(lines[0].ends_with("Open #12 Add login"));
        assert_eq!(lines[1], "Labels: bug, ui");
        assert_eq!(lines[2], "Reviewers: alice");
        assert_eq!(lines[3], "Reviews: bob (approved)");
        assert_eq!(lines[5].chars().count(), 30);
        assert!(lines[5].ends_with('…'));
    }

    #[test]
    fn test_worktree_preview_sections() {
        let runner = Rc::new(
            MockRunner::new()
                .respond("git rev-parse --abbrev-ref HEAD", "topic\n")
                .respond("git log -1 --format=%ct|%H|%h|%s HEAD", "1700000000|abcdef|abc|feat: x\n")
                .respond("git log --oneline", "abc feat: x\n")
                .respond("git diff --cached", "diff --git a/a b/a\n")
                .respond("git diff --color", ""),
        );
        let api = Rc::new(MockApi::new());
        let prompter = Rc::new(MockPrompter::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&runner, &api, &prompter, dir.path());
        session.flags.apply_fast();
        session.settings.preview_columns = 4;

        let out = render_worktree(&mut session, Path::new("/trees/topic"));
        let sections: Vec<&str> = out.split("\n────\n").collect();
        assert_eq!(sections.len(), 3);
        assert!(sections[0].contains("topic  [topic]"));
        assert!(sections[0].contains("abc feat: x"));
        assert_eq!(sections[1], "Recent commits:\nabc feat: x");
        assert_eq!(sections[2], "Staged changes:\ndiff --git a/a b/a");
    }

    #[test]
    fn test_open_uses_pr_url() {
        let runner = Rc::new(
            MockRunner::new()
                .respond("git remote", "origin\n")
                .respond("git remote get-url origin", "git@github.com:o/r.git\n"),
        );
        let api = Rc::new(MockApi::new().graphql_reply(json!({ "repository": { "pullRequests": { "nodes": [{
            "number": 9,
            "state": "OPEN",
            "headRefName": "topic",
            "baseRepository": { "owner": { "login": "o" }, "name": "r" }
        }] } } })));
        let prompter = Rc::new(MockPrompter::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&runner, &api, &prompter, dir.path());

        assert_eq!(open(&mut session, "origin/topic").unwrap(), 0);
        assert!(runner
            .calls()
            .iter()
            .any(|c| c.ends_with("open https://github.com/o/r/pull/9")));
        assert_eq!(open(&mut session, "missing").unwrap(), 1);
    }
}
