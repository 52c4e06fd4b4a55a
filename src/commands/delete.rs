use super::browse::fetch_reload_bind;
use super::{resolve_remote, self_command_with};
use crate::cli::Cli;
use crate::errors::Result;
use crate::fzf::{self, FinderRequest};
use crate::git;
use crate::rows;
use crate::session::Session;
use crate::worktrees;

/// Multi-select local branches and delete them, offering a forced retry when
/// git refuses (unmerged work).
pub fn local(cli: &Cli, session: &mut Session) -> Result<i32> {
    let mut opts = cli.list_options();
    opts.filter.pr_only = false;
    let rows = rows::build_local_rows(session, &opts)?;
    let reload = self_command_with(session, &["--emit-local-rows"], &cli.listing_args(false));
    let request = FinderRequest {
        header: "Select local branches to DELETE (multi-select with TAB)".to_string(),
        preview: Some(session.self_command(&["-p", "{2}"])),
        multi: true,
        binds: vec![
            format!("ctrl-o:execute-silent({})", session.self_command(&["-o", "{2}"])),
            format!(
                "alt-k:execute({})+reload({})",
                session.self_command(&["--delete-branch-or-worktree", "{2}"]),
                reload
            ),
        ],
        ..FinderRequest::default()
    };
    let selection = fzf::select(session.runner(), &rows, &request)?;
    if selection.is_empty() {
        return Ok(0);
    }
    let selected = &selection.values;

    println!("Will delete local branches: {}", selected.join(" "));
    if !session.prompter.confirm("Continue?") {
        return Ok(1);
    }

    let mut argv = vec!["git", "branch"];
    if cli.force {
        argv.push("--force");
    }
    argv.push("--delete");
    argv.extend(selected.iter().map(String::as_str));
    let out = session.runner().run(&argv, None, false)?;
    if out.success() {
        return Ok(0);
    }
    eprint!("{}", out.stderr);
    if !session
        .prompter
        .confirm("Some branches couldn't be deleted. Force delete?")
    {
        return Ok(1);
    }
    let mut forced = vec!["git", "branch", "--delete", "--force"];
    forced.extend(selected.iter().map(String::as_str));
    let forced = session.runner().run(&forced, None, false)?;
    if !forced.success() {
        eprint!("{}", forced.stderr);
        return Ok(1);
    }
    Ok(0)
}

/// Multi-select branches of a remote and delete them there, then prune.
pub fn remote(cli: &Cli, session: &mut Session) -> Result<i32> {
    let Some(remote) = resolve_remote(cli, session)? else {
        eprintln!("Error: No remotes configured");
        return Ok(1);
    };
    let mut opts = cli.list_options();
    opts.filter.pr_only = false;
    let rows = rows::build_remote_rows(session, &remote, &opts)?;
    let listing: Vec<String> = cli
        .listing_args(false)
        .into_iter()
        .filter(|arg| arg != "--pr-only")
        .collect();
    let request = FinderRequest {
        header: format!(
            "Select remote branches to DELETE from {} (multi-select with TAB, Alt-f=fetch)",
            remote
        ),
        preview: Some(session.self_command(&["-p", &format!("{}/{{2}}", remote)])),
        multi: true,
        binds: vec![fetch_reload_bind(session, &remote, &listing)],
        ..FinderRequest::default()
    };
    let selection = fzf::select(session.runner(), &rows, &request)?;
    if selection.is_empty() {
        return Ok(0);
    }

    let runner = session.runner();
    let url = git::remote_ssh_url(runner, &remote);
    println!(
        "Will delete remote branches: {} on {}",
        selection.values.join(" "),
        url
    );
    if !session.prompter.confirm("Continue?") {
        return Ok(1);
    }

    let mut failed = 0;
    for branch in &selection.values {
        let mut argv = vec!["git", "push"];
        if cli.force {
            argv.push("--force");
        }
        argv.extend(["--delete", url.as_str(), branch.as_str()]);
        match runner.run(&argv, None, true) {
            Ok(_) => log::info!("Deleted {} on {}", branch, remote),
            Err(e) => {
                eprintln!("Error: could not delete {}: {}", branch, e);
                failed += 1;
            }
        }
    }
    if let Err(e) = runner.run(&["git", "remote", "prune", &remote], None, false) {
        log::debug!("prune of {} failed: {}", remote, e);
    }
    Ok(if failed == 0 { 0 } else { 1 })
}

/// Alt-k in the local browser: remove the branch, and its worktree if it
/// has one.
pub fn branch_or_worktree(session: &Session, branch: &str) -> Result<i32> {
    let runner = session.runner();
    if let Some(path) = worktrees::worktree_path_for_branch(runner, branch) {
        let question = format!("'{}' is a worktree. Delete worktree and branch?", branch);
        if !session.prompter.confirm(&question) {
            return Ok(0);
        }
        let path = path.display().to_string();
        let removed = runner
            .run(&["git", "worktree", "remove", &path], None, true)
            .and_then(|_| runner.run(&["git", "branch", "--delete", "--force", branch], None, true));
        return Ok(match removed {
            Ok(_) => 0,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        });
    }

    if !session.prompter.confirm(&format!("Delete branch '{}'?", branch)) {
        return Ok(1);
    }
    one(session, branch)
}

/// Force-delete `branch` without asking.
pub fn one(session: &Session, branch: &str) -> Result<i32> {
    let out = session
        .runner()
        .run(&["git", "branch", "--delete", "--force", branch], None, false)?;
    if !out.success() {
        eprint!("{}", out.stderr);
        return Ok(1);
    }
    Ok(0)
}
