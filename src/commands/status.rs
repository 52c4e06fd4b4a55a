use crate::errors::Result;
use crate::git::{self, CommitSummary};
use crate::github::checks::ci_label;
use crate::github::PrState;
use crate::render::{format_epoch, highlight_subject, osc8, pad_left, Colors};
use crate::session::Session;

const MAX_FILES: usize = 20;

/// `--status`: the current branch, its working tree and unpushed commits.
pub fn execute(session: &mut Session) -> Result<i32> {
    println!("{}", render(session));
    Ok(0)
}

pub fn render(session: &mut Session) -> String {
    let branch = git::current_branch(session.runner());
    if branch.is_empty() {
        return "Not in a git repository or detached HEAD".to_string();
    }
    let c = session.colors.clone();
    let runner = session.runner();
    let porcelain = git::status_porcelain(runner, None);
    let counts = git::StatusCounts::parse(&porcelain);
    let tracking = git::tracking(runner, "HEAD", None);
    let (ahead, behind) = tracking.as_ref().map_or((0, 0), |t| (t.ahead, t.behind));

    let mut lines = vec![format!("{}{}Current Status: {}{}", c.bold, c.current, branch, c.reset)];

    let mut tokens = Vec::new();
    if counts.is_dirty() {
        tokens.push(c.paint(&c.red, "dirty"));
    }
    if counts.staged > 0 {
        tokens.push(c.paint(&c.green, &format!("staged:{}", counts.staged)));
    }
    if counts.unstaged > 0 {
        tokens.push(c.paint(&c.yellow, &format!("unstaged:{}", counts.unstaged)));
    }
    if counts.untracked > 0 {
        tokens.push(c.paint(&c.grey, &format!("untracked:{}", counts.untracked)));
    }
    if ahead > 0 {
        tokens.push(c.paint(&c.green, &format!("↑{}", ahead)));
    }
    if behind > 0 {
        tokens.push(c.paint(&c.red, &format!("↓{}", behind)));
    }
    if !tokens.is_empty() {
        lines.push(format!("  [{}]", tokens.join(" ")));
    }
    if let Some(t) = &tracking {
        lines.push(format!("  {}", c.paint(&c.grey, &format!("Tracking: {}", t.upstream))));
    }

    let files: Vec<(&str, &str)> = porcelain
        .lines()
        .filter(|l| l.len() > 3)
        .map(|l| (&l[..2], &l[3..]))
        .collect();
    if !files.is_empty() {
        lines.push(String::new());
        lines.push(format!("{}Changed files:{}", c.bold, c.reset));
        for (code, name) in files.iter().take(MAX_FILES) {
            lines.push(format_file(code, name, &c));
        }
        if files.len() > MAX_FILES {
            let more = format!("... and {} more files", files.len() - MAX_FILES);
            lines.push(format!("  {}", c.paint(&c.grey, &more)));
        }
    }

    if let Some(t) = tracking.as_ref().filter(|t| t.ahead > 0) {
        let unpushed = git::unpushed_commits(runner, &format!("{}..HEAD", t.upstream));
        if !unpushed.is_empty() {
            let commit_base = session.base_repo().filter(|_| c.enabled());
            lines.push(String::new());
            lines.push(format!("{}Unpushed commits ({}):{}", c.bold, unpushed.len(), c.reset));
            for commit in &unpushed {
                let url = commit_base.as_ref().map(|b| b.commit_url(&commit.full_sha));
                lines.push(format_commit(commit, url.as_deref(), &c));
            }
        }
    }

    if session.flags.online() {
        if let Some(pr) = session.lookup_pr(&branch) {
            lines.push(String::new());
            lines.push(format!("{}Pull Request: #{} - {}{}", c.bold, pr.number, pr.title, c.reset));
            let state = if pr.is_draft && pr.state == PrState::Open {
                c.paint(&c.yellow, "draft")
            } else if pr.is_merged() {
                c.paint(&c.magenta, "merged")
            } else if pr.state == PrState::Closed {
                c.paint(&c.red, "closed")
            } else {
                c.paint(&c.green, "open")
            };
            lines.push(format!("  Status: {}", state));

            if !pr.head_sha.is_empty() {
                let run = session
                    .peek_checks(&pr.head_sha)
                    .or_else(|| session.fetch_checks(&pr.head_sha));
                if let Some(run) = run {
                    let (label, _) = ci_label(&run);
                    lines.push(format!("  CI Status: {}", label));
                }
            }
        }
    }

    lines.join("\n")
}

fn format_file(code: &str, name: &str, c: &Colors) -> String {
    let color = match code {
        "M " | "MM" => &c.yellow,
        " M" | "D " | " D" => &c.red,
        "A " | " A" => &c.green,
        "R " | "C " => &c.cyan,
        _ => &c.grey,
    };
    let code = code.trim();
    let code = if code.is_empty() { "??" } else { code };
    format!("  {} {}", c.paint(color, &format!("{:<2}", code)), name)
}

fn format_commit(commit: &CommitSummary, url: Option<&str>, c: &Colors) -> String {
    let hash = c.paint(&c.commit, &commit.short_sha);
    let hash = match url {
        Some(url) => osc8(url, &hash),
        None => hash,
    };
    let date = c.paint(&c.date, &pad_left(&format_epoch(commit.epoch, "%b-%d"), 8));
    format!("  {} {} {}", hash, date, highlight_subject(&commit.subject, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fzf::mock::MockPrompter;
    use crate::github::api::mock::MockApi;
    use crate::process::mock::MockRunner;
    use crate::session::testing;
    use serde_json::json;
    use std::rc::Rc;

    fn status_runner(porcelain: &str) -> MockRunner {
        MockRunner::new()
            .respond("git remote", "origin\n")
            .respond("git remote get-url origin", "git@github.com:o/r.git\n")
            .respond("git symbolic-ref", "topic\n")
            .respond("git status --porcelain", porcelain)
            .respond(
                "git rev-parse --abbrev-ref --symbolic-full-name HEAD@{u}",
                "origin/topic\n",
            )
            .respond("git rev-list --count origin/topic..HEAD", "1\n")
            .respond("git rev-list --count HEAD..origin/topic", "2\n")
            .respond(
                "git log --format=%h|%H|%ct|%s origin/topic..HEAD",
                "abc1234|abc1234ffff|0|fix: typo\n",
            )
    }

    #[test]
    fn test_status_offline() {
        let runner = Rc::new(status_runner("M  src/a.rs\n M src/b.rs\n?? new.txt\n"));
        let api = Rc::new(MockApi::new());
        let prompter = Rc::new(MockPrompter::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&runner, &api, &prompter, dir.path());
        session.flags.apply_fast();

        let out = render(&mut session);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Current Status: topic");
        assert_eq!(lines[1], "  [dirty staged:1 unstaged:1 untracked:1 ↑1 ↓2]");
        assert_eq!(lines[2], "  Tracking: origin/topic");
        assert_eq!(lines[4], "Changed files:");
        assert_eq!(lines[5], "  M  src/a.rs");
        assert_eq!(lines[6], "  M  src/b.rs");
        assert_eq!(lines[7], "  ?? new.txt");
        assert_eq!(lines[9], "Unpushed commits (1):");
        assert!(lines[10].starts_with("  abc1234  unknown"));
        assert!(!out.contains("Pull Request"));
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn test_status_caps_file_list() {
        let porcelain: String = (0..25).map(|i| format!("?? f{}.txt\n", i)).collect();
        let runner = Rc::new(status_runner(&porcelain));
        let api = Rc::new(MockApi::new());
        let prompter = Rc::new(MockPrompter::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&runner, &api, &prompter, dir.path());
        session.flags.apply_fast();

        let out = render(&mut session);
        assert!(out.contains("  ?? f19.txt"));
        assert!(!out.contains("f20.txt"));
        assert!(out.contains("  ... and 5 more files"));
    }

    #[test]
    fn test_status_pr_block_online() {
        let runner = Rc::new(status_runner(""));
        let api = Rc::new(MockApi::new().graphql_reply(json!({ "repository": { "pullRequests": { "nodes": [{
            "number": 3,
            "state": "OPEN",
            "isDraft": true,
            "title": "Fix typo",
            "headRefName": "topic",
            "baseRepository": { "owner": { "login": "o" }, "name": "r" }
        }] } } })));
        let prompter = Rc::new(MockPrompter::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&runner, &api, &prompter, dir.path());

        let out = render(&mut session);
        assert!(out.contains("Pull Request: #3 - Fix typo\n  Status: draft"));
    }

    #[test]
    fn test_status_without_branch() {
        let runner = Rc::new(MockRunner::new());
        let api = Rc::new(MockApi::new());
        let prompter = Rc::new(MockPrompter::new());
        let dir = tempfile::tempdir().unwrap();
        let mut session = testing::session(&runner, &api, &prompter, dir.path());
        assert_eq!(render(&mut session), "Not in a git repository or detached HEAD");
    }
}
