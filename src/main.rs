use clap::Parser;
use cli::Cli;
use errors::{BranchesError, Result};
use fzf::TerminalPrompter;
use github::UreqApi;
use process::SystemRunner;
use render::Colors;
use session::{Session, SessionFlags, Settings};
use std::path::Path;

mod cli;
mod commands;
mod errors;
mod fzf;
mod git;
mod github;
mod jira;
mod process;
mod render;
mod rows;
mod session;
mod spinner;
mod worktrees;

fn main() {
    env_logger::init();

    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("\nCancelled by user.");
        std::process::exit(130);
    }) {
        log::debug!("could not install interrupt handler: {}", e);
    }

    let args = Cli::parse();

    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Cli) -> Result<i32> {
    if let Some(dir) = &args.directory {
        std::env::set_current_dir(dir)
            .map_err(|e| BranchesError::Directory(dir.display().to_string(), e))?;
    }

    let intent = args.intent();
    if intent.is_interactive() {
        git::ensure_deps(&SystemRunner, true)?;
    }

    let mut flags = SessionFlags::from_env();
    if args.fast {
        flags.apply_fast();
    }
    flags.refresh |= args.refresh;
    flags.checks |= args.checks;

    let repo = git::discover_repository(Path::new(".")).ok();
    let config = repo.as_ref().and_then(|r| r.config().ok());
    let mut settings = Settings::load(config.as_ref(), &session::system_env);
    if let Some(pattern) = &args.jira_pattern {
        settings.jira_pattern = pattern.clone();
    }
    if let Some(url) = &args.jira_url {
        settings.jira_url = url.clone();
    }
    if let Some(base) = &args.base_branch {
        settings.base_branch = base.clone();
    }
    if args.no_jira {
        settings.jira_enabled = false;
    }

    let mut session = Session::new(
        flags,
        settings,
        Box::new(SystemRunner),
        Box::new(UreqApi::new()),
        Box::new(TerminalPrompter),
        session::cache_dir(&session::system_env),
    );
    session.colors = Colors::detect(session.runner(), args.no_color);
    session.forward_args = args.forward_args();
    session.pr_states = args.pr_states();

    log::debug!("running {:?}", intent);
    commands::execute(intent, args, &mut session)
}
