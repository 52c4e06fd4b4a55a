use super::{resolve_remote, self_command_with};
use crate::cli::Cli;
use crate::errors::{BranchesError, Result};
use crate::fzf::{self, shell_quote, FinderRequest, Row};
use crate::git;
use crate::rows;
use crate::session::Session;
use crate::worktrees;

const LOCAL_HEADER: &str = "(Ctrl-o=open, Alt-r=rename, Alt-w=WIP, Alt-p=PR Only, Alt-k delete)";

/// Interactive local branch picker. Enter checks out the selection.
pub fn local(cli: &Cli, session: &mut Session) -> Result<i32> {
    let rows = rows::build_local_rows(session, &cli.list_options())?;
    let request = FinderRequest {
        header: LOCAL_HEADER.to_string(),
        preview: Some(session.self_command(&["-p", "{2}"])),
        binds: local_binds(cli, session),
        ..FinderRequest::default()
    };
    let selection = fzf::select(session.runner(), &rows, &request)?;
    let Some(branch) = selection.first() else {
        return Ok(1);
    };
    if cli.list_only {
        println!("{}", branch);
        return Ok(0);
    }
    switch_to_branch(session, branch, None)
}

fn local_binds(cli: &Cli, session: &Session) -> Vec<String> {
    let reload = self_command_with(session, &["--emit-local-rows"], &cli.listing_args(false));
    let toggle = self_command_with(session, &["--emit-local-rows"], &cli.listing_args(true));
    let prefix = shell_quote(&session.settings.wip_prefix);
    vec![
        format!("ctrl-o:execute-silent({})", session.self_command(&["-o", "{2}"])),
        format!(
            "alt-k:execute({})+reload({})",
            session.self_command(&["--delete-branch-or-worktree", "{2}"]),
            reload
        ),
        format!(
            "alt-r:execute(reply=$(gum input --value={{2}} --prompt=\"Rename branch: \") && git branch -m {{2}} \"$reply\")+reload({})",
            reload
        ),
        format!(
            "alt-w:execute(b={{2}}; case \"$b\" in {p}*) n=\"${{b#{p}}}\";; *) n={p}\"$b\";; esac; git branch -m \"$b\" \"$n\")+reload({r})",
            p = prefix,
            r = reload
        ),
        format!("alt-p:reload({})", toggle),
    ]
}

/// Interactive picker over the branches of one remote.
pub fn remote(cli: &Cli, session: &mut Session) -> Result<i32> {
    let Some(remote) = resolve_remote(cli, session)? else {
        eprintln!("Error: No remotes configured");
        return Ok(1);
    };
    let rows = rows::build_remote_rows(session, &remote, &cli.list_options())?;
    let request = FinderRequest {
        header: format!(
            "Remote branches from {} (ENTER=checkout, ESC=cancel, Alt-f=fetch)",
            remote
        ),
        preview: Some(session.self_command(&["-p", &format!("{}/{{2}}", remote)])),
        binds: vec![
            format!("ctrl-o:execute-silent({})", session.self_command(&["-o", "{2}"])),
            fetch_reload_bind(session, &remote, &cli.listing_args(false)),
        ],
        ..FinderRequest::default()
    };
    let selection = fzf::select(session.runner(), &rows, &request)?;
    let Some(branch) = selection.first() else {
        return Ok(1);
    };
    if cli.list_only {
        println!("{}", branch);
        return Ok(0);
    }
    switch_to_branch(session, branch, Some(&remote))
}

/// Alt-f: fetch and prune `remote`, then rebuild its rows with `listing`.
pub(crate) fn fetch_reload_bind(session: &Session, remote: &str, listing: &[String]) -> String {
    format!(
        "alt-f:execute-silent(git fetch --prune {})+reload({})",
        shell_quote(remote),
        self_command_with(session, &["--emit-remote-rows", remote], listing)
    )
}

/// Move to `branch`: record its worktree path when it has one, otherwise
/// check it out here. Remote branches without a local counterpart get a
/// tracking branch.
pub fn switch_to_branch(session: &Session, branch: &str, remote: Option<&str>) -> Result<i32> {
    let runner = session.runner();
    if let Some(path) = worktrees::worktree_path_for_branch(runner, branch) {
        log::debug!("{} lives in worktree {}", branch, path.display());
        worktrees::write_path_file(&session.path_file, &path)?;
        worktrees::save_last_worktree(&session.last_worktree_file(), &path);
        return Ok(0);
    }

    if git::is_workdir_dirty(runner, None) {
        return Err(BranchesError::DirtyWorktree);
    }

    match remote {
        Some(remote) if !git::has_local_branch(runner, branch) => {
            let upstream = format!("{}/{}", remote, branch);
            log::info!("Creating {} from {}", branch, upstream);
            runner.run(&["git", "checkout", "-b", branch, &upstream], None, true)?;
        }
        _ => {
            log::info!("Checking out {}", branch);
            runner.run(&["git", "checkout", branch], None, true)?;
        }
    }
    Ok(0)
}

fn print_rows(rows: &[Row]) {
    for row in rows {
        println!("{}\t{}", row.display, row.value);
    }
}

/// Rows for fzf `reload` bindings.
pub fn emit_local_rows(cli: &Cli, session: &mut Session) -> Result<i32> {
    print_rows(&rows::build_local_rows(session, &cli.list_options())?);
    Ok(0)
}

pub fn emit_remote_rows(cli: &Cli, session: &mut Session, remote: &str) -> Result<i32> {
    print_rows(&rows::build_remote_rows(session, remote, &cli.list_options())?);
    Ok(0)
}

/// Pick a worktree and hand its path to the shell integration. The worktree
/// entered last is listed first.
pub fn worktrees(session: &mut Session) -> Result<i32> {
    let now = chrono::Utc::now().timestamp();
    let mut entries = worktrees::collect(session.runner(), &session.settings, now);
    let last_file = session.last_worktree_file();
    match worktrees::load_last_worktree(&last_file) {
        Some(last) if !last.is_dir() => worktrees::clear_last_worktree(&last_file),
        Some(last) => {
            if let Some(pos) = entries.iter().position(|e| e.path == last) {
                let entry = entries.remove(pos);
                entries.insert(0, entry);
            }
        }
        None => {}
    }
    if entries.is_empty() {
        eprintln!("No worktrees found.");
        return Ok(1);
    }
    let cols = crate::render::term_cols(rows::FALLBACK_WIDTH);
    let rows: Vec<Row> = entries
        .iter()
        .map(|info| {
            Row::new(
                worktrees::format_worktree_row(info, &session.colors, cols),
                info.path.display().to_string(),
            )
        })
        .collect();
    let request = FinderRequest {
        header: "Worktrees (Enter=switch)".to_string(),
        preview: Some(session.self_command(&["--preview-worktree", "{2}"])),
        ..FinderRequest::default()
    };
    let selection = fzf::select(session.runner(), &rows, &request)?;
    let Some(path) = selection.first() else {
        return Ok(1);
    };
    let path = std::path::PathBuf::from(path);
    worktrees::write_path_file(&session.path_file, &path)?;
    worktrees::save_last_worktree(&session.last_worktree_file(), &path);
    Ok(0)
}
