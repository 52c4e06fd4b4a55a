use crate::github::PrState;
use crate::rows::{ListOptions, RowFilter};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Listing limit applied by `-s` unless `-S` or `-n` says otherwise.
const STATUS_LIMIT: usize = 10;

#[derive(Debug, Parser, Default)]
#[command(name = "git-branches")]
#[command(about = "Browse, check out and clean up git branches and GitHub pull requests with fzf", long_about = None)]
pub struct Cli {
    /// Browse remote branches (interactive remote selection)
    #[arg(short = 'r')]
    pub remote_mode: bool,

    /// Browse branches of a specific remote
    #[arg(short = 'R', value_name = "REMOTE")]
    pub remote_name: Option<String>,

    /// Delete local branches (interactive multi-select)
    #[arg(short = 'd')]
    pub delete_local: bool,

    /// Delete remote branches (interactive multi-select)
    #[arg(short = 'D')]
    pub delete_remote: bool,

    /// Force deletion
    #[arg(short = 'f')]
    pub force: bool,

    /// Show GitHub pushed status (branch exists on remote)
    #[arg(short = 's')]
    pub show_status: bool,

    /// With -s, show all branches (no default limit)
    #[arg(short = 'S')]
    pub show_status_all: bool,

    /// Limit to the first NUM branches
    #[arg(short = 'n', value_name = "NUM")]
    pub limit: Option<usize>,

    /// Disable colors
    #[arg(short = 'C')]
    pub no_color: bool,

    /// List mode only: print the selection instead of checking it out
    #[arg(short = 'l')]
    pub list_only: bool,

    /// Offline mode: no network calls, no spinner, no cache files
    #[arg(long)]
    pub fast: bool,

    /// Fetch and show GitHub Actions status
    #[arg(long)]
    pub checks: bool,

    /// Ignore cached pull request data
    #[arg(long)]
    pub refresh: bool,

    /// PR states to include (repeatable)
    #[arg(long = "pr-states", value_enum, ignore_case = true, value_name = "STATE")]
    pub pr_states: Vec<PrStateArg>,

    /// Show only branches that have pull requests
    #[arg(long)]
    pub pr_only: bool,

    /// Hide branches starting with the WIP prefix
    #[arg(long)]
    pub no_wip: bool,

    /// Hide branches that have pull requests
    #[arg(long)]
    pub no_pr: bool,

    /// Show only branches checked out in a worktree
    #[arg(long)]
    pub worktree: bool,

    /// Hide branches matching a regex
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude_pattern: Option<String>,

    /// Disable JIRA ticket integration in previews
    #[arg(long)]
    pub no_jira: bool,

    /// Regex for JIRA ticket detection
    #[arg(long, value_name = "REGEX")]
    pub jira_pattern: Option<String>,

    /// JIRA base URL for ticket links
    #[arg(long, value_name = "URL")]
    pub jira_url: Option<String>,

    /// Base branch for comparisons (default: main)
    #[arg(long, value_name = "BRANCH")]
    pub base_branch: Option<String>,

    /// Directory to run in
    #[arg(long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Show current git status and unpushed changes
    #[arg(long = "status")]
    pub show_current_status: bool,

    /// Browse pull requests (Enter=checkout, Alt-w=create worktree)
    #[arg(long = "prs")]
    pub browse_prs: bool,

    /// Browse worktrees and print the selected path
    #[arg(long = "worktrees")]
    pub browse_worktrees: bool,

    #[arg(short = 'o', value_name = "REF", hide = true)]
    pub open_ref: Option<String>,

    #[arg(short = 'p', value_name = "REF", hide = true)]
    pub preview_ref: Option<String>,

    #[arg(long, value_name = "PATH", hide = true)]
    pub preview_worktree: Option<PathBuf>,

    #[arg(long, value_name = "BRANCH", hide = true)]
    pub delete_one: Option<String>,

    #[arg(long, value_name = "BRANCH", hide = true)]
    pub delete_branch_or_worktree: Option<String>,

    #[arg(long, hide = true)]
    pub emit_local_rows: bool,

    #[arg(long, value_name = "REMOTE", hide = true)]
    pub emit_remote_rows: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PrStateArg {
    Open,
    Closed,
    Merged,
    All,
}

/// The one thing an invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Status,
    BrowsePrs,
    DeleteBranchOrWorktree(String),
    Open(String),
    Preview(String),
    PreviewWorktree(PathBuf),
    EmitLocalRows,
    EmitRemoteRows(String),
    DeleteOne(String),
    BrowseWorktrees,
    DeleteRemote,
    DeleteLocal,
    BrowseRemote,
    BrowseLocal,
}

impl Intent {
    /// Whether this intent starts fzf.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            Intent::BrowsePrs
                | Intent::BrowseWorktrees
                | Intent::DeleteRemote
                | Intent::DeleteLocal
                | Intent::BrowseRemote
                | Intent::BrowseLocal
        )
    }
}

impl Cli {
    /// Status preview, then PR browsing, then the single-shot helpers, then
    /// the interactive modes.
    pub fn intent(&self) -> Intent {
        if self.show_current_status {
            return Intent::Status;
        }
        if self.browse_prs {
            return Intent::BrowsePrs;
        }
        if let Some(branch) = &self.delete_branch_or_worktree {
            return Intent::DeleteBranchOrWorktree(branch.clone());
        }
        if let Some(reference) = &self.open_ref {
            return Intent::Open(reference.clone());
        }
        if let Some(reference) = &self.preview_ref {
            return Intent::Preview(reference.clone());
        }
        if let Some(path) = &self.preview_worktree {
            return Intent::PreviewWorktree(path.clone());
        }
        if self.emit_local_rows {
            return Intent::EmitLocalRows;
        }
        if let Some(remote) = &self.emit_remote_rows {
            return Intent::EmitRemoteRows(remote.clone());
        }
        if let Some(branch) = &self.delete_one {
            return Intent::DeleteOne(branch.clone());
        }
        if self.browse_worktrees {
            return Intent::BrowseWorktrees;
        }
        if self.delete_remote {
            return Intent::DeleteRemote;
        }
        if self.delete_local {
            return Intent::DeleteLocal;
        }
        if self.remote_mode || self.remote_name.is_some() {
            return Intent::BrowseRemote;
        }
        Intent::BrowseLocal
    }

    /// `-n`, or 10 when `-s` is given without `-S`.
    pub fn effective_limit(&self) -> Option<usize> {
        match self.limit {
            Some(n) if n > 0 => Some(n),
            _ if self.show_status && !self.show_status_all => Some(STATUS_LIMIT),
            _ => None,
        }
    }

    pub fn row_filter(&self) -> RowFilter {
        RowFilter {
            pr_only: self.pr_only,
            no_wip: self.no_wip,
            no_pr: self.no_pr,
            exclude: self.exclude_pattern.clone(),
            worktree_only: self.worktree,
        }
    }

    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            show_status: self.show_status,
            limit: self.effective_limit(),
            filter: self.row_filter(),
        }
    }

    /// States for the bulk PR listing; empty means every state.
    pub fn pr_states(&self) -> Vec<PrState> {
        if self.pr_states.is_empty() {
            return vec![PrState::Open];
        }
        if self.pr_states.contains(&PrStateArg::All) {
            return Vec::new();
        }
        let mut states: Vec<PrState> = self
            .pr_states
            .iter()
            .filter_map(|s| match s {
                PrStateArg::Open => Some(PrState::Open),
                PrStateArg::Closed => Some(PrState::Closed),
                PrStateArg::Merged => Some(PrState::Merged),
                PrStateArg::All => None,
            })
            .collect();
        states.sort();
        states.dedup();
        states
    }

    /// Flags child invocations (previews, reloads) must inherit.
    pub fn forward_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.fast {
            args.push("--fast".to_string());
        }
        if self.checks {
            args.push("--checks".to_string());
        }
        if self.no_color {
            args.push("-C".to_string());
        }
        args
    }

    /// Flags that reproduce the current listing for `--emit-*-rows` reloads.
    /// `toggle_pr_only` flips `--pr-only`.
    pub fn listing_args(&self, toggle_pr_only: bool) -> Vec<String> {
        let mut args = Vec::new();
        if self.show_status {
            args.push("-s".to_string());
        }
        if self.show_status_all {
            args.push("-S".to_string());
        }
        if self.pr_only != toggle_pr_only {
            args.push("--pr-only".to_string());
        }
        if self.no_wip {
            args.push("--no-wip".to_string());
        }
        if self.no_pr {
            args.push("--no-pr".to_string());
        }
        if self.worktree {
            args.push("--worktree".to_string());
        }
        if let Some(pattern) = &self.exclude_pattern {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }
        if let Some(limit) = self.effective_limit() {
            args.push("-n".to_string());
            args.push(limit.to_string());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("git-branches").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_intent_priority() {
        assert_eq!(parse(&[]).intent(), Intent::BrowseLocal);
        assert_eq!(parse(&["--status", "--prs", "-d"]).intent(), Intent::Status);
        assert_eq!(parse(&["--prs", "-p", "main"]).intent(), Intent::BrowsePrs);
        assert_eq!(parse(&["-p", "main", "-d"]).intent(), Intent::Preview("main".into()));
        assert_eq!(parse(&["-o", "x", "-p", "y"]).intent(), Intent::Open("x".into()));
        assert_eq!(
            parse(&["--emit-remote-rows", "origin"]).intent(),
            Intent::EmitRemoteRows("origin".into())
        );
        assert_eq!(parse(&["-D", "-d"]).intent(), Intent::DeleteRemote);
        assert_eq!(parse(&["-R", "upstream"]).intent(), Intent::BrowseRemote);
        assert!(parse(&["-r"]).intent().is_interactive());
        assert!(!parse(&["-p", "x"]).intent().is_interactive());
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(parse(&[]).effective_limit(), None);
        assert_eq!(parse(&["-s"]).effective_limit(), Some(10));
        assert_eq!(parse(&["-s", "-S"]).effective_limit(), None);
        assert_eq!(parse(&["-s", "-n", "3"]).effective_limit(), Some(3));
    }

    #[test]
    fn test_pr_states() {
        assert_eq!(parse(&[]).pr_states(), vec![PrState::Open]);
        assert_eq!(
            parse(&["--pr-states", "MERGED", "--pr-states", "open"]).pr_states(),
            vec![PrState::Open, PrState::Merged]
        );
        assert!(parse(&["--pr-states", "all", "--pr-states", "open"]).pr_states().is_empty());
        assert!(Cli::try_parse_from(["git-branches", "--pr-states", "bogus"]).is_err());
    }

    #[test]
    fn test_listing_args_toggle_pr_only() {
        let cli = parse(&["--no-wip", "--exclude", "^tmp/", "-n", "5"]);
        assert_eq!(
            cli.listing_args(false),
            vec!["--no-wip", "--exclude", "^tmp/", "-n", "5"]
        );
        assert_eq!(cli.listing_args(true)[0], "--pr-only");
        assert!(!parse(&["--pr-only"]).listing_args(true).contains(&"--pr-only".to_string()));
    }

    #[test]
    fn test_forward_args() {
        assert_eq!(parse(&["--fast", "-C", "--refresh"]).forward_args(), vec!["--fast", "-C"]);
        assert!(parse(&["--refresh"]).forward_args().is_empty());
    }
}
