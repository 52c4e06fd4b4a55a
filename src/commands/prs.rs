use crate::errors::{BranchesError, Result};
use crate::fzf::{self, FinderRequest, Row};
use crate::git;
use crate::github::{self, PullRequestSummary};
use crate::rows::{self, PrRow};
use crate::session::Session;
use crate::worktrees;

const HEADER: &str = "Pull requests (Enter=checkout, Alt-w=create worktree)";

/// Pick a pull request, then check it out here or in a new worktree.
pub fn execute(session: &mut Session) -> Result<i32> {
    if session.base_remote().is_none() {
        eprintln!("Error: No GitHub remote detected for pull requests.");
        return Ok(1);
    }
    let entries = rows::build_pr_rows(session);
    if entries.is_empty() {
        eprintln!("No pull requests found or GitHub data unavailable.");
        return Ok(1);
    }

    let rows: Vec<Row> = entries.iter().map(|e| e.row.clone()).collect();
    let request = FinderRequest {
        header: HEADER.to_string(),
        expect: vec!["enter".to_string(), "alt-w".to_string()],
        ..FinderRequest::default()
    };
    let selection = fzf::select(session.runner(), &rows, &request)?;
    let Some(number) = selection.first() else {
        return Ok(1);
    };
    let Some(entry) = entries.iter().find(|e| e.row.value == number) else {
        return Ok(1);
    };

    if let Some(path) = &entry.worktree {
        worktrees::write_path_file(&session.path_file, path)?;
        return Ok(0);
    }
    match selection.key.as_deref() {
        Some("alt-w") => create_worktree(session, entry),
        _ => checkout(session, &entry.pr),
    }
}

/// `gh pr checkout` into the current working tree, after confirmation.
pub fn checkout(session: &Session, pr: &PullRequestSummary) -> Result<i32> {
    if pr.head_branch.is_empty() {
        return Ok(1);
    }
    let runner = session.runner();
    if git::is_workdir_dirty(runner, None) {
        return Err(BranchesError::DirtyWorktree);
    }
    if !github::cli::gh_available(runner) {
        return Err(BranchesError::MissingDependency("gh".to_string()));
    }
    let question = format!("Checkout PR #{} to branch '{}'?", pr.number, pr.head_branch);
    if !session.prompter.confirm(&question) {
        return Ok(1);
    }
    github::cli::checkout_pr(runner, pr.number, &pr.head_branch, None)?;
    println!("Checked out {}", pr.head_branch);
    Ok(0)
}

/// Check the PR out in `<worktree base>/<branch>` and hand that path to the
/// shell. An existing directory is reused as is.
pub fn create_worktree(session: &Session, entry: &PrRow) -> Result<i32> {
    let pr = &entry.pr;
    let runner = session.runner();
    let target = worktrees::worktree_base_dir(runner, &session.settings)?.join(&pr.head_branch);
    if target.exists() {
        worktrees::write_path_file(&session.path_file, &target)?;
        return Ok(0);
    }

    let question = format!(
        "Create worktree at {} and checkout PR #{}?",
        target.display(),
        pr.number
    );
    if !session.prompter.confirm(&question) {
        return Ok(1);
    }
    if !github::cli::gh_available(runner) {
        return Err(BranchesError::MissingDependency("gh".to_string()));
    }

    let target_arg = target.display().to_string();
    log::info!("Adding worktree {}", target_arg);
    runner.run(&["git", "worktree", "add", "--detach", &target_arg], None, true)?;
    worktrees::save_last_worktree(&session.last_worktree_file(), &target);

    github::cli::checkout_pr(runner, pr.number, &pr.head_branch, Some(&target))?;
    worktrees::write_path_file(&session.path_file, &target)?;
    Ok(0)
}
