pub mod browse;
pub mod delete;
pub mod preview;
pub mod prs;
pub mod status;

use crate::cli::{Cli, Intent};
use crate::errors::Result;
use crate::session::Session;

/// Carry out `intent` and return the process exit code.
pub fn execute(intent: Intent, cli: &Cli, session: &mut Session) -> Result<i32> {
    match intent {
        Intent::Status => status::execute(session),
        Intent::BrowsePrs => prs::execute(session),
        Intent::DeleteBranchOrWorktree(branch) => delete::branch_or_worktree(session, &branch),
        Intent::Open(reference) => preview::open(session, &reference),
        Intent::Preview(reference) => preview::branch(session, &reference),
        Intent::PreviewWorktree(path) => preview::worktree(session, &path),
        Intent::EmitLocalRows => browse::emit_local_rows(cli, session),
        Intent::EmitRemoteRows(remote) => browse::emit_remote_rows(cli, session, &remote),
        Intent::DeleteOne(branch) => delete::one(session, &branch),
        Intent::BrowseWorktrees => browse::worktrees(session),
        Intent::DeleteRemote => delete::remote(cli, session),
        Intent::DeleteLocal => delete::local(cli, session),
        Intent::BrowseRemote => browse::remote(cli, session),
        Intent::BrowseLocal => browse::local(cli, session),
    }
}

/// Shell command re-invoking this binary with `head` followed by `tail`.
pub(crate) fn self_command_with(session: &Session, head: &[&str], tail: &[String]) -> String {
    let args: Vec<&str> = head
        .iter()
        .copied()
        .chain(tail.iter().map(String::as_str))
        .collect();
    session.self_command(&args)
}

/// Remote from `-R`, otherwise picked interactively.
pub(crate) fn resolve_remote(cli: &Cli, session: &Session) -> Result<Option<String>> {
    if let Some(remote) = &cli.remote_name {
        return Ok(Some(remote.clone()));
    }
    crate::fzf::select_remote(session.runner(), session.remotes())
}
