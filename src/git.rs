// Git related

use crate::errors::{BranchesError, Result};
use crate::process::Runner;
use std::collections::BTreeMap;
use std::path::Path;

/// Tip commit of a ref, as reported by `git for-each-ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub epoch: i64,
    pub full_sha: String,
    pub short_sha: String,
    pub subject: String,
}

/// Process-lifetime map of ref short name to its tip commit.
///
/// Filled in bulk with a single `for-each-ref` call. Entries are never
/// overwritten once present.
#[derive(Debug, Default)]
pub struct CommitIndex {
    commits: BTreeMap<String, CommitSummary>,
}

const COMMIT_FORMAT: &str =
    "--format=%(refname:short)|%(committerdate:unix)|%(objectname)|%(objectname:short)|%(subject)";

impl CommitIndex {
    pub fn populate(&mut self, runner: &dyn Runner, refs: &[String]) {
        if refs.is_empty() {
            return;
        }
        let mut argv = vec!["git", "for-each-ref", COMMIT_FORMAT];
        argv.extend(refs.iter().map(String::as_str));

        let output = match runner.run(&argv, None, false) {
            Ok(out) if out.success() => out.stdout,
            Ok(out) => {
                log::debug!("for-each-ref exited with {}", out.code);
                return;
            }
            Err(e) => {
                log::debug!("for-each-ref failed: {}", e);
                return;
            }
        };

        for line in output.lines() {
            let mut parts = line.splitn(5, '|');
            let (Some(name), Some(epoch), Some(full), Some(short)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let subject = parts.next().unwrap_or_default();
            self.commits
                .entry(name.to_string())
                .or_insert_with(|| CommitSummary {
                    epoch: epoch.parse().unwrap_or(0),
                    full_sha: full.to_string(),
                    short_sha: short.to_string(),
                    subject: subject.to_string(),
                });
        }
    }

    pub fn get(&self, name: &str) -> Option<&CommitSummary> {
        self.commits.get(name)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.commits.len()
    }
}

/// Open the repository containing `path`.
pub fn discover_repository(path: &Path) -> Result<git2::Repository> {
    git2::Repository::discover(path).map_err(|e| {
        if e.code() == git2::ErrorCode::NotFound {
            BranchesError::NotARepository
        } else {
            BranchesError::Git(e)
        }
    })
}

/// Fail unless we are inside a repository and, for interactive flows, fzf is
/// installed.
pub fn ensure_deps(runner: &dyn Runner, interactive: bool) -> Result<()> {
    if interactive && !runner.which("fzf") {
        eprintln!("Install with: brew install fzf (macOS) or apt install fzf (Ubuntu)");
        return Err(BranchesError::MissingDependency("fzf".to_string()));
    }
    discover_repository(Path::new(".")).map(|_| ())
}

pub fn current_branch(runner: &dyn Runner) -> String {
    runner
        .run(&["git", "symbolic-ref", "-q", "--short", "HEAD"], None, false)
        .ok()
        .filter(|out| out.success())
        .map(|out| out.stdout.trim().to_string())
        .unwrap_or_default()
}

/// Local branches, most recently committed first.
pub fn local_branches(runner: &dyn Runner, limit: Option<usize>) -> Result<Vec<String>> {
    let out = runner.run(
        &[
            "git",
            "for-each-ref",
            "--sort=-committerdate",
            "--format=%(refname:short)",
            "refs/heads/",
        ],
        None,
        true,
    )?;
    let branches = out
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    Ok(apply_limit(branches, limit))
}

/// Branches of `remote` with the `remote/` prefix removed.
pub fn remote_branches(runner: &dyn Runner, remote: &str, limit: Option<usize>) -> Result<Vec<String>> {
    let pattern = format!("refs/remotes/{}/", remote);
    let out = runner.run(
        &[
            "git",
            "for-each-ref",
            "--sort=-committerdate",
            "--format=%(refname:short)",
            &pattern,
        ],
        None,
        true,
    )?;
    let prefix = format!("{}/", remote);
    let branches = out
        .stdout
        .lines()
        .map(str::trim)
        .filter_map(|l| l.strip_prefix(&prefix))
        .filter(|name| !name.is_empty() && *name != "HEAD" && !name.contains("->"))
        .map(str::to_string);
    Ok(apply_limit(branches, limit))
}

fn apply_limit(items: impl Iterator<Item = String>, limit: Option<usize>) -> Vec<String> {
    match limit {
        Some(n) if n > 0 => items.take(n).collect(),
        _ => items.collect(),
    }
}

pub fn remotes(runner: &dyn Runner) -> Vec<String> {
    runner
        .run(&["git", "remote"], None, false)
        .map(|out| {
            out.stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn remote_url(runner: &dyn Runner, remote: &str) -> Option<String> {
    runner
        .run(&["git", "remote", "get-url", remote], None, false)
        .ok()
        .filter(|out| out.success())
        .map(|out| out.stdout.trim().to_string())
        .filter(|url| !url.is_empty())
}

/// Push URL for deletions: https remotes are rewritten to the
/// `git@host:owner/repo` form so the SSH agent is used.
pub fn remote_ssh_url(runner: &dyn Runner, remote: &str) -> String {
    let Some(url) = remote_url(runner, remote) else {
        return remote.to_string();
    };
    match url.strip_prefix("https://") {
        Some(rest) => format!("git@{}", rest.replacen('/', ":", 1)),
        None => url,
    }
}

pub fn has_local_branch(runner: &dyn Runner, branch: &str) -> bool {
    if branch.is_empty() {
        return false;
    }
    let full = format!("refs/heads/{}", branch);
    runner
        .run(&["git", "show-ref", "--verify", "--quiet", &full], None, false)
        .map(|out| out.success())
        .unwrap_or(false)
}

/// Strip `refs/heads/`, `refs/remotes/<remote>/` or a known `remote/`
/// prefix from a ref.
pub fn normalize_ref(reference: &str, remotes: &[String]) -> String {
    if let Some(branch) = reference.strip_prefix("refs/heads/") {
        return branch.to_string();
    }
    if let Some(rest) = reference.strip_prefix("refs/remotes/") {
        return rest.split_once('/').map_or(rest, |(_, branch)| branch).to_string();
    }
    if let Some((remote, branch)) = reference.split_once('/') {
        if remotes.iter().any(|r| r == remote) {
            return branch.to_string();
        }
    }
    reference.to_string()
}

/// Counts from `git status --porcelain`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
}

impl StatusCounts {
    pub fn parse(porcelain: &str) -> Self {
        let mut counts = Self::default();
        for line in porcelain.lines() {
            let mut chars = line.chars();
            let Some(x) = chars.next() else { continue };
            let y = chars.next().unwrap_or(' ');
            if x != ' ' && x != '?' {
                counts.staged += 1;
            }
            if y != ' ' {
                if y == '?' {
                    counts.untracked += 1;
                } else {
                    counts.unstaged += 1;
                }
            } else if x == '?' {
                counts.untracked += 1;
            }
        }
        counts
    }

    pub fn is_dirty(&self) -> bool {
        self.total() > 0
    }

    pub fn total(&self) -> usize {
        self.staged + self.unstaged + self.untracked
    }
}

pub fn status_porcelain(runner: &dyn Runner, cwd: Option<&Path>) -> String {
    runner
        .run(&["git", "status", "--porcelain"], cwd, false)
        .ok()
        .filter(|out| out.success())
        .map(|out| out.stdout)
        .unwrap_or_default()
}

pub fn status_counts(runner: &dyn Runner, cwd: Option<&Path>) -> StatusCounts {
    StatusCounts::parse(&status_porcelain(runner, cwd))
}

/// Staged, unstaged or untracked changes in the working tree. Errors count as
/// clean so non-repository contexts keep working.
pub fn is_workdir_dirty(runner: &dyn Runner, cwd: Option<&Path>) -> bool {
    !status_porcelain(runner, cwd).trim().is_empty()
}

/// Upstream of `rev` and how far `rev` is ahead of / behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tracking {
    pub upstream: String,
    pub ahead: usize,
    pub behind: usize,
}

pub fn tracking(runner: &dyn Runner, rev: &str, cwd: Option<&Path>) -> Option<Tracking> {
    let upstream_spec = format!("{}@{{u}}", rev);
    let out = runner
        .run(
            &["git", "rev-parse", "--abbrev-ref", "--symbolic-full-name", &upstream_spec],
            cwd,
            false,
        )
        .ok()?;
    let upstream = out.stdout.trim().to_string();
    if !out.success() || upstream.is_empty() {
        return None;
    }
    let ahead = count_revs(runner, &format!("{}..{}", upstream, rev), cwd);
    let behind = count_revs(runner, &format!("{}..{}", rev, upstream), cwd);
    Some(Tracking {
        upstream,
        ahead,
        behind,
    })
}

fn count_revs(runner: &dyn Runner, range: &str, cwd: Option<&Path>) -> usize {
    runner
        .run(&["git", "rev-list", "--count", range], cwd, false)
        .ok()
        .and_then(|out| out.stdout.trim().parse().ok())
        .unwrap_or(0)
}

/// `HEAD` commit of the checkout at `cwd`.
pub fn head_commit(runner: &dyn Runner, cwd: Option<&Path>) -> Option<CommitSummary> {
    let out = runner
        .run(&["git", "log", "-1", "--format=%ct|%H|%h|%s", "HEAD"], cwd, false)
        .ok()
        .filter(|out| out.success())?;
    let line = out.stdout.lines().next()?.to_string();
    let mut parts = line.splitn(4, '|');
    Some(CommitSummary {
        epoch: parts.next()?.parse().unwrap_or(0),
        full_sha: parts.next()?.to_string(),
        short_sha: parts.next()?.to_string(),
        subject: parts.next().unwrap_or_default().to_string(),
    })
}

/// Ref names pointing at `rev`, e.g. `HEAD -> main, origin/main`.
pub fn decoration(runner: &dyn Runner, rev: &str, cwd: Option<&Path>) -> String {
    runner
        .run(&["git", "log", "-1", "--format=%D", rev], cwd, false)
        .ok()
        .filter(|out| out.success())
        .map(|out| out.stdout.trim().to_string())
        .unwrap_or_default()
}

/// Commits in `range`, one entry per commit.
pub fn unpushed_commits(runner: &dyn Runner, range: &str) -> Vec<CommitSummary> {
    let Ok(out) = runner.run(&["git", "log", "--format=%h|%H|%ct|%s", range], None, false) else {
        return Vec::new();
    };
    if !out.success() {
        return Vec::new();
    }
    out.stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(4, '|');
            let short = parts.next()?;
            let full = parts.next()?;
            let epoch = parts.next()?;
            let subject = parts.next()?;
            Some(CommitSummary {
                epoch: epoch.parse().unwrap_or(0),
                full_sha: full.to_string(),
                short_sha: short.to_string(),
                subject: subject.to_string(),
            })
        })
        .collect()
}

pub fn repo_root(runner: &dyn Runner) -> Option<String> {
    runner
        .run(&["git", "rev-parse", "--show-toplevel"], None, false)
        .ok()
        .filter(|out| out.success())
        .map(|out| out.stdout.trim().to_string())
        .filter(|root| !root.is_empty())
}
