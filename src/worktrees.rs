use crate::errors::Result;
use crate::git;
use crate::process::Runner;
use crate::render::{format_epoch, highlight_subject, pad_left, pad_right, truncate_display, Colors};
use crate::session::Settings;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const LABEL_WIDTH: usize = 28;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub name: String,
    pub branch: Option<String>,
    pub short_sha: String,
    pub commit_epoch: i64,
    pub subject: String,
    pub dirty: bool,
    pub tracking: Option<String>,
    pub ahead: usize,
    pub behind: usize,
    pub is_current: bool,
}

/// One entry of `git worktree list --porcelain`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
}

pub fn parse_porcelain(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;
    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            entries.extend(current.take());
            current = Some(WorktreeEntry {
                path: PathBuf::from(path),
                ..WorktreeEntry::default()
            });
            continue;
        }
        let Some(entry) = current.as_mut() else {
            continue;
        };
        if let Some(head) = line.strip_prefix("HEAD ") {
            entry.head = head.to_string();
        } else if let Some(branch) = line.strip_prefix("branch ") {
            let branch = branch.strip_prefix("refs/heads/").unwrap_or(branch);
            entry.branch = Some(branch.to_string());
        } else if line.is_empty() {
            entries.extend(current.take());
        }
    }
    entries.extend(current);
    entries
}

pub fn list_entries(runner: &dyn Runner) -> Vec<WorktreeEntry> {
    match runner.run(&["git", "worktree", "list", "--porcelain"], None, false) {
        Ok(out) if out.success() => parse_porcelain(&out.stdout),
        _ => Vec::new(),
    }
}

/// Branch name to the worktree it is checked out in.
pub fn branch_worktrees(runner: &dyn Runner) -> BTreeMap<String, PathBuf> {
    list_entries(runner)
        .into_iter()
        .filter_map(|e| e.branch.map(|b| (b, e.path)))
        .collect()
}

pub fn worktree_path_for_branch(runner: &dyn Runner, branch: &str) -> Option<PathBuf> {
    branch_worktrees(runner).remove(branch)
}

/// Dirty worktrees first, then newest commit, then name.
pub fn sort_key(info: &WorktreeInfo) -> (bool, Reverse<i64>, String) {
    (!info.dirty, Reverse(info.commit_epoch), info.name.to_lowercase())
}

fn inspect(runner: &dyn Runner, path: &Path, name: String, branch: Option<String>) -> WorktreeInfo {
    let commit = git::head_commit(runner, Some(path));
    let tracking = git::tracking(runner, "HEAD", Some(path));
    WorktreeInfo {
        path: path.to_path_buf(),
        name,
        branch,
        short_sha: commit.as_ref().map(|c| c.short_sha.clone()).unwrap_or_default(),
        commit_epoch: commit.as_ref().map_or(0, |c| c.epoch),
        subject: commit.map(|c| c.subject).unwrap_or_default(),
        dirty: git::status_counts(runner, Some(path)).is_dirty(),
        ahead: tracking.as_ref().map_or(0, |t| t.ahead),
        behind: tracking.as_ref().map_or(0, |t| t.behind),
        tracking: tracking.map(|t| t.upstream),
        is_current: false,
    }
}

fn is_repository(runner: &dyn Runner, path: &Path) -> bool {
    runner
        .run(&["git", "rev-parse", "--is-inside-work-tree"], Some(path), false)
        .map(|out| out.success() && out.stdout.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn branch_at(runner: &dyn Runner, path: &Path) -> Option<String> {
    let out = runner
        .run(&["git", "rev-parse", "--abbrev-ref", "HEAD"], Some(path), false)
        .ok()?;
    let branch = out.stdout.trim();
    (out.success() && !branch.is_empty() && branch != "HEAD").then(|| branch.to_string())
}

/// Repositories directly under `basedir`. The `main` checkout, when named,
/// goes last.
pub fn collect_from_basedir(
    runner: &dyn Runner,
    basedir: &Path,
    main: Option<&str>,
    now: i64,
) -> Vec<WorktreeInfo> {
    let Ok(read_dir) = std::fs::read_dir(basedir) else {
        return Vec::new();
    };
    let mut children: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    children.sort_by_key(|p| dir_name(p).to_lowercase());

    let mut entries = Vec::new();
    let mut main_entry = None;
    for child in children {
        if !is_repository(runner, &child) {
            continue;
        }
        let name = dir_name(&child);
        let mut info = inspect(runner, &child, name.clone(), branch_at(runner, &child));
        // Uncommitted work counts as the most recent activity.
        if info.dirty && info.commit_epoch < now {
            info.commit_epoch = now;
        }
        if main == Some(name.as_str()) {
            main_entry = Some(info);
        } else {
            entries.push(info);
        }
    }
    entries.sort_by_key(sort_key);
    entries.extend(main_entry);
    entries
}

pub fn collect_git_worktrees(runner: &dyn Runner) -> Vec<WorktreeInfo> {
    let root = git::repo_root(runner).map(PathBuf::from);
    let mut entries: Vec<WorktreeInfo> = list_entries(runner)
        .into_iter()
        .map(|entry| {
            let name = entry
                .branch
                .clone()
                .unwrap_or_else(|| dir_name(&entry.path));
            let mut info = inspect(runner, &entry.path, name, entry.branch.clone());
            if info.short_sha.is_empty() {
                info.short_sha = entry.head.chars().take(7).collect();
            }
            info.is_current = root.as_deref() == Some(entry.path.as_path());
            info
        })
        .collect();
    entries.sort_by_key(sort_key);
    entries
}

/// Worktrees from the configured base directory when it holds any
/// repositories, otherwise from git itself.
pub fn collect(runner: &dyn Runner, settings: &Settings, now: i64) -> Vec<WorktreeInfo> {
    if let Some(basedir) = settings.worktree_basedir.as_deref().filter(|d| d.is_dir()) {
        let entries = collect_from_basedir(runner, basedir, settings.worktree_main.as_deref(), now);
        if !entries.is_empty() {
            return entries;
        }
    }
    collect_git_worktrees(runner)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn format_worktree_row(info: &WorktreeInfo, colors: &Colors, cols: usize) -> String {
    let label = pad_right(&truncate_display(&info.name, LABEL_WIDTH), LABEL_WIDTH);
    let hash = pad_right(&info.short_sha, 8);
    let date = pad_left(&format_epoch(info.commit_epoch, "%b-%d"), 8);

    let mut subject = highlight_subject(&info.subject, colors);
    if let Some(branch) = info.branch.as_deref().filter(|b| *b != info.name) {
        subject = if subject.is_empty() {
            format!("[{}]", branch)
        } else {
            format!("[{}] {}", branch, subject)
        };
    }
    let subject = truncate_display(&subject, cols.saturating_sub(80).max(20));

    let mut tokens = Vec::new();
    if info.dirty {
        tokens.push(colors.paint(&colors.red, "dirty"));
    }
    if info.ahead > 0 {
        tokens.push(colors.paint(&colors.green, &format!("↑{}", info.ahead)));
    }
    if info.behind > 0 {
        tokens.push(colors.paint(&colors.red, &format!("↓{}", info.behind)));
    }
    let status = if tokens.is_empty() {
        String::new()
    } else {
        format!("  [{}]", tokens.join(" "))
    };

    format!(
        "{} {} {} {}{}  {}",
        colors.paint(&colors.magenta, &label),
        colors.paint(&colors.commit, &hash),
        colors.paint(&colors.date, &date),
        subject,
        status,
        colors.paint(&colors.grey, &info.path.display().to_string())
    )
    .trim()
    .to_string()
}

/// Record `path` for the shell wrapper to `cd` into, and print it.
pub fn write_path_file(path_file: &Path, path: &Path) -> Result<()> {
    std::fs::write(path_file, path.display().to_string())?;
    println!("{}", path.display());
    Ok(())
}

pub fn load_last_worktree(file: &Path) -> Option<PathBuf> {
    let raw = std::fs::read_to_string(file).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

pub fn save_last_worktree(file: &Path, path: &Path) {
    let result = file
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| std::fs::write(file, path.display().to_string()));
    if let Err(e) = result {
        log::debug!("could not save last worktree: {}", e);
    }
}

pub fn clear_last_worktree(file: &Path) {
    let _ = std::fs::remove_file(file);
}

/// Directory new worktrees are created in: the configured base directory,
/// else the parent of the repository.
pub fn worktree_base_dir(runner: &dyn Runner, settings: &Settings) -> Result<PathBuf> {
    let base = match &settings.worktree_basedir {
        Some(dir) => dir.clone(),
        None => match git::repo_root(runner).map(PathBuf::from) {
            Some(root) => root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or(root),
            None => std::env::current_dir()?.join(".git-branches-worktrees"),
        },
    };
    std::fs::create_dir_all(&base)?;
    Ok(base)
}
