use crate::errors::Result;
use crate::fzf::Row;
use crate::git::{self, CommitSummary};
use crate::github::{PrState, PullRequestSummary};
use crate::render::{
    ci_icon, commit_kind, format_epoch, highlight_subject, kind_icon, local_branch_icon, osc8,
    pad_left, pad_right, pr_icon, push_icon, term_cols, truncate_display, visible_width,
    worktree_icon, Colors,
};
use crate::session::Session;
use crate::worktrees;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;

const BRANCH_WIDTH: usize = 24;
const HASH_WIDTH: usize = 8;
const DATE_WIDTH: usize = 10;
/// Row width when stdout is not a terminal.
pub const FALLBACK_WIDTH: usize = 120;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    pub pr_only: bool,
    pub no_wip: bool,
    pub no_pr: bool,
    pub exclude: Option<String>,
    pub worktree_only: bool,
}

/// What to list and how much of it.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub show_status: bool,
    pub limit: Option<usize>,
    pub filter: RowFilter,
}

/// Apply `filter` in its fixed order: PR-only, WIP, has-PR, exclude pattern,
/// worktree-only. The PR filters are skipped when `online` is false.
pub fn filter_branches(
    branches: &[String],
    filter: &RowFilter,
    wip_prefix: &str,
    online: bool,
    has_pr: impl Fn(&str) -> bool,
    in_worktree: impl Fn(&str) -> bool,
) -> Vec<String> {
    let exclude = filter.exclude.as_deref().and_then(|pattern| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            log::debug!("ignoring invalid exclude pattern {:?}: {}", pattern, e);
            None
        }
    });

    branches
        .iter()
        .filter(|b| !(filter.pr_only && online) || has_pr(b.as_str()))
        .filter(|b| !filter.no_wip || !b.starts_with(wip_prefix))
        .filter(|b| !(filter.no_pr && online) || !has_pr(b.as_str()))
        .filter(|b| exclude.as_ref().map_or(true, |re| !re.is_match(b.as_str())))
        .filter(|b| !filter.worktree_only || in_worktree(b.as_str()))
        .cloned()
        .collect()
}

/// Everything one branch row shows.
#[derive(Debug, Default)]
pub struct BranchRow<'a> {
    pub branch: &'a str,
    pub is_current: bool,
    pub commit: Option<&'a CommitSummary>,
    pub status: String,
    pub pr: Option<&'a PullRequestSummary>,
    pub own_pr: bool,
    pub commit_url: Option<String>,
}

/// Fixed-width columns followed by the subject, which takes all truncation
/// needed to fit `max_width`.
pub fn format_branch_row(row: &BranchRow, colors: &Colors, max_width: usize) -> String {
    let subject = row.commit.map_or(row.branch, |c| c.subject.as_str());
    let icon = commit_kind(subject)
        .and_then(|kind| kind_icon(&kind))
        .unwrap_or(" ");

    let branch_color = if row.is_current { &colors.current } else { &colors.local };
    let branch = colors.paint(
        branch_color,
        &pad_right(&truncate_display(row.branch, BRANCH_WIDTH), BRANCH_WIDTH),
    );

    let short = row.commit.map_or("", |c| c.short_sha.as_str());
    let painted_hash = colors.paint(&colors.commit, short);
    let hash = match &row.commit_url {
        Some(url) if colors.enabled() && !short.is_empty() => osc8(url, &painted_hash),
        _ => painted_hash,
    };
    let hash = pad_right(&hash, HASH_WIDTH);

    let date = format_epoch(row.commit.map_or(0, |c| c.epoch), "%Y-%m-%d");
    let date = colors.paint(&colors.date, &pad_left(&date, DATE_WIDTH));

    let status_width = visible_width(&row.status);
    let fixed = 2 + BRANCH_WIDTH + 1 + HASH_WIDTH + 1 + DATE_WIDTH + 1
        + if status_width > 0 { status_width + 1 } else { 0 };
    let available = max_width.saturating_sub(fixed);
    let fit = |text: &str, reserved: usize| {
        if available > 10 {
            truncate_display(text, available.saturating_sub(reserved))
        } else {
            text.to_string()
        }
    };

    let tail = match row.pr {
        Some(pr) => {
            let number = format!("#{}", pr.number);
            let title = fit(&pr.title, number.chars().count() + 1);
            let number = if row.own_pr {
                format!("{}{}{}{}{}", colors.bold, colors.italic_on, number, colors.italic_off, colors.reset)
            } else {
                colors.paint(&colors.cyan, &number)
            };
            format!("{} {}", number, title)
        }
        None => highlight_subject(&fit(subject, 0), colors),
    };

    let mut line = format!("{} {} {} {} ", icon, branch, hash, date);
    if status_width > 0 {
        line.push_str(&row.status);
        line.push(' ');
    }
    line.push_str(&tail);
    line
}

/// Local branches as finder rows; the value is the branch name.
pub fn build_local_rows(session: &mut Session, opts: &ListOptions) -> Result<Vec<Row>> {
    let branches = git::local_branches(session.runner(), opts.limit)?;
    let current = git::current_branch(session.runner());
    Ok(build_rows(session, &branches, None, &current, opts))
}

/// Branches of `remote` as finder rows; the value is the bare branch name.
pub fn build_remote_rows(session: &mut Session, remote: &str, opts: &ListOptions) -> Result<Vec<Row>> {
    let branches = git::remote_branches(session.runner(), remote, opts.limit)?;
    Ok(build_rows(session, &branches, Some(remote), "", opts))
}

fn build_rows(
    session: &mut Session,
    branches: &[String],
    remote: Option<&str>,
    current: &str,
    opts: &ListOptions,
) -> Vec<Row> {
    let ref_name = |b: &str| match remote {
        Some(remote) => format!("{}/{}", remote, b),
        None => b.to_string(),
    };
    let full_refs: Vec<String> = branches
        .iter()
        .map(|b| match remote {
            Some(remote) => format!("refs/remotes/{}/{}", remote, b),
            None => format!("refs/heads/{}", b),
        })
        .collect();

    let online = session.flags.online();
    if online {
        session.populate_prs();
        let display: Vec<String> = branches.iter().map(|b| ref_name(b)).collect();
        session.prefetch_pr_details(&display);
    }
    session.commits.populate(session.runner.as_ref(), &full_refs);
    if session.flags.checks_active() {
        let shas: Vec<String> = branches
            .iter()
            .filter_map(|b| session.commits.get(&ref_name(b)).map(|c| c.full_sha.clone()))
            .collect();
        session.prefetch_checks(&shas);
    }

    let prs: BTreeMap<String, PullRequestSummary> = if online {
        branches
            .iter()
            .filter_map(|b| session.lookup_pr(b).map(|pr| (b.clone(), pr)))
            .collect()
    } else {
        BTreeMap::new()
    };
    let worktree_map = worktrees::branch_worktrees(session.runner());
    let visible = filter_branches(
        branches,
        &opts.filter,
        &session.settings.wip_prefix,
        online,
        |b| prs.contains_key(b),
        |b| worktree_map.contains_key(b),
    );

    let me = session.current_user().map(str::to_string);
    let base = session.base_repo();
    let max_width = term_cols(FALLBACK_WIDTH);
    let mut rows = Vec::with_capacity(visible.len());
    for branch in &visible {
        let key = ref_name(branch);
        let commit = session.commits.get(&key).cloned();
        let pr = prs.get(branch.as_str());

        let mut tokens = Vec::new();
        if let Some(pr) = pr {
            tokens.push(pr_icon(pr, &session.colors).0);
        }
        if let Some(run) = commit.as_ref().and_then(|c| session.peek_checks(&c.full_sha)) {
            tokens.push(ci_icon(&run, &session.colors).0);
        }
        if tokens.is_empty() && opts.show_status {
            if let Some(status) = session.pushed_status(branch) {
                tokens.push(push_icon(status, &session.colors));
            }
        }

        let row = BranchRow {
            branch,
            is_current: branch == current,
            commit: commit.as_ref(),
            status: tokens.join(" "),
            pr,
            own_pr: match (pr.and_then(|p| p.author.as_deref()), me.as_deref()) {
                (Some(author), Some(me)) => !me.is_empty() && author == me,
                _ => false,
            },
            commit_url: match (&base, &commit) {
                (Some(base), Some(c)) => Some(base.commit_url(&c.full_sha)),
                _ => None,
            },
        };
        rows.push(Row::new(
            format_branch_row(&row, &session.colors, max_width),
            branch.clone(),
        ));
    }
    rows
}

/// One selectable pull request.
#[derive(Debug, Clone)]
pub struct PrRow {
    pub row: Row,
    pub pr: PullRequestSummary,
    pub has_local: bool,
    pub worktree: Option<PathBuf>,
}

/// Pull requests from the bulk listing, restricted to the session's states.
/// The row value is the PR number.
pub fn build_pr_rows(session: &mut Session) -> Vec<PrRow> {
    let entries = session.pr_entries();
    let worktree_map = worktrees::branch_worktrees(session.runner());
    let title_width = term_cols(FALLBACK_WIDTH).saturating_sub(40).max(30);
    let states = session.pr_states.clone();
    let colors = &session.colors;

    entries
        .into_iter()
        .filter(|pr| pr.number > 0)
        .filter(|pr| {
            states.is_empty()
                || states.contains(&pr.state)
                || (pr.is_merged() && states.contains(&PrState::Merged))
        })
        .map(|pr| {
            let has_local = git::has_local_branch(session.runner.as_ref(), &pr.head_branch);
            let worktree = worktree_map.get(&pr.head_branch).cloned();

            let mut parts = vec![pr_icon(&pr, colors).0];
            if has_local {
                parts.push(local_branch_icon(colors));
            }
            if worktree.is_some() {
                parts.push(worktree_icon(colors));
            }
            parts.push(format!("#{}", pr.number));
            let title = if pr.title.is_empty() { "(no title)" } else { pr.title.as_str() };
            parts.push(truncate_display(title, title_width));
            let mut display = parts.join(" ");
            if !pr.head_branch.is_empty() {
                display.push_str(&format!(" [{}]", pr.head_branch));
            }

            PrRow {
                row: Row::new(display, pr.number.to_string()),
                pr,
                has_local,
                worktree,
            }
        })
        .collect()
}
