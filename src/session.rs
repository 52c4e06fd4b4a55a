use crate::fzf::{shell_quote, Prompter};
use crate::git::{self, CommitIndex};
use crate::github::{self, CheckCache, CiRunSummary, GitHubApi, PrCache, PrState, PullRequestSummary, PushStatus, RepoSlug};
use crate::process::Runner;
use crate::render::Colors;
use crate::spinner::Spinner;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub fn system_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// `1`, `true` and `yes` (any case) switch a flag on.
pub fn truthy(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim).map(str::to_lowercase).as_deref(),
        Some("1" | "true" | "yes")
    )
}

/// Per-process switches controlling network and cache use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFlags {
    pub offline: bool,
    pub no_progress: bool,
    pub no_cache: bool,
    pub refresh: bool,
    pub checks: bool,
    pub prefetch_details: bool,
}

impl SessionFlags {
    pub fn from_lookup(env: EnvLookup) -> Self {
        Self {
            offline: truthy(env("GIT_BRANCHES_OFFLINE")),
            no_progress: truthy(env("GIT_BRANCHES_NO_PROGRESS")),
            no_cache: truthy(env("GIT_BRANCHES_NO_CACHE")),
            refresh: truthy(env("GIT_BRANCHES_REFRESH")),
            checks: truthy(env("GIT_BRANCHES_SHOW_CHECKS")),
            prefetch_details: truthy(env("GIT_BRANCHES_PREFETCH_DETAILS")),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(&system_env)
    }

    /// Local-only mode: no network, no spinner, no cache files, no prefetch.
    pub fn apply_fast(&mut self) {
        self.offline = true;
        self.no_progress = true;
        self.no_cache = true;
        self.prefetch_details = false;
    }

    pub fn bypass_cache(&self) -> bool {
        self.refresh || self.no_cache
    }

    pub fn checks_active(&self) -> bool {
        self.checks && !self.offline
    }

    pub fn online(&self) -> bool {
        !self.offline
    }

    pub fn progress(&self) -> bool {
        !self.no_progress
    }
}

/// Tunables from git config and the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub wip_prefix: String,
    pub base_branch: String,
    pub jira_enabled: bool,
    pub jira_pattern: String,
    pub jira_url: String,
    pub preview_columns: usize,
    pub preview_commits: usize,
    pub worktree_basedir: Option<PathBuf>,
    pub worktree_main: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wip_prefix: "WIP-".to_string(),
            base_branch: "main".to_string(),
            jira_enabled: true,
            jira_pattern: r"(SRVKP-\d+)".to_string(),
            jira_url: "https://issues.redhat.com".to_string(),
            preview_columns: 80,
            preview_commits: 10,
            worktree_basedir: None,
            worktree_main: None,
        }
    }
}

impl Settings {
    /// Defaults, overridden by `git-branches.*` git config, overridden by
    /// environment variables.
    pub fn load(config: Option<&git2::Config>, env: EnvLookup) -> Self {
        let mut settings = Self::default();

        if let Some(config) = config {
            let get = |key: &str| config.get_string(&format!("git-branches.{}", key)).ok();
            if let Some(v) = get("wipPrefix") {
                settings.wip_prefix = v;
            }
            if let Some(v) = get("baseBranch") {
                settings.base_branch = v;
            }
            if let Some(v) = get("jiraPattern") {
                settings.jira_pattern = v;
            }
            if let Some(v) = get("jiraUrl") {
                settings.jira_url = v;
            }
        }

        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("GIT_BRANCHES_BASE_BRANCH") {
            settings.base_branch = v;
        }
        if let Some(v) = non_empty("GIT_BRANCHES_JIRA_PATTERN") {
            settings.jira_pattern = v;
        }
        if let Some(v) = non_empty("GIT_BRANCHES_JIRA_URL") {
            settings.jira_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = non_empty("GIT_BRANCHES_JIRA_ENABLED") {
            settings.jira_enabled = truthy(Some(v));
        }
        if let Some(n) = non_empty("FZF_PREVIEW_COLUMNS").and_then(|v| v.trim().parse().ok()) {
            settings.preview_columns = n;
        }
        if let Some(n) = non_empty("FZF_PREVIEW_COMMITS").and_then(|v| v.trim().parse().ok()) {
            settings.preview_commits = n;
        }
        settings.worktree_basedir = non_empty("GIT_BRANCHES_WORKTREE_BASEDIR")
            .or_else(|| non_empty("PM_BASEDIR"))
            .map(|v| expand_home(&v));
        settings.worktree_main =
            non_empty("GIT_BRANCHES_WORKTREE_MAIN").or_else(|| non_empty("PM_MAIN"));
        settings
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// `$XDG_CACHE_HOME/git-branches`, then `$GIT_BRANCHES_CACHE_DIR`, then
/// `~/.cache/git-branches`.
pub fn cache_dir(env: EnvLookup) -> PathBuf {
    if let Some(xdg) = env("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("git-branches");
    }
    if let Some(dir) = env("GIT_BRANCHES_CACHE_DIR").filter(|v| !v.is_empty()) {
        return expand_home(&dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".cache")
        .join("git-branches")
}

/// State shared by everything one invocation does.
pub struct Session {
    pub flags: SessionFlags,
    pub settings: Settings,
    pub runner: Box<dyn Runner>,
    pub api: Box<dyn GitHubApi>,
    pub prompter: Box<dyn Prompter>,
    pub colors: Colors,
    pub cache_dir: PathBuf,
    pub path_file: PathBuf,
    /// Program and arguments used when fzf bindings call back into us.
    pub exe: String,
    pub forward_args: Vec<String>,
    /// PR states requested from the bulk listing.
    pub pr_states: Vec<PrState>,
    pub commits: CommitIndex,
    prs: PrCache,
    checks: CheckCache,
    remotes: OnceCell<Vec<String>>,
    base_remote: OnceCell<Option<(String, RepoSlug)>>,
    current_user: OnceCell<Option<String>>,
}

impl Session {
    pub fn new(
        flags: SessionFlags,
        settings: Settings,
        runner: Box<dyn Runner>,
        api: Box<dyn GitHubApi>,
        prompter: Box<dyn Prompter>,
        cache_dir: PathBuf,
    ) -> Self {
        let exe = std::env::current_exe()
            .ok()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "git-branches".to_string());
        Self {
            flags,
            settings,
            runner,
            api,
            prompter,
            colors: Colors::default(),
            prs: PrCache::new(&cache_dir),
            checks: CheckCache::new(&cache_dir),
            path_file: std::env::temp_dir().join(".git-branches-path"),
            cache_dir,
            exe,
            forward_args: Vec::new(),
            pr_states: vec![PrState::Open],
            commits: CommitIndex::default(),
            remotes: OnceCell::new(),
            base_remote: OnceCell::new(),
            current_user: OnceCell::new(),
        }
    }

    pub fn runner(&self) -> &dyn Runner {
        self.runner.as_ref()
    }

    pub fn remotes(&self) -> &[String] {
        self.remotes.get_or_init(|| git::remotes(self.runner.as_ref()))
    }

    /// Remote (and its repository) that pull requests are opened against.
    pub fn base_remote(&self) -> Option<&(String, RepoSlug)> {
        self.base_remote
            .get_or_init(|| github::detect_base_remote(self.runner.as_ref(), self.remotes()))
            .as_ref()
    }

    pub fn base_repo(&self) -> Option<RepoSlug> {
        self.base_remote().map(|(_, slug)| slug.clone())
    }

    pub fn normalize_ref_to_branch(&self, reference: &str) -> String {
        git::normalize_ref(reference, self.remotes())
    }

    /// Shell command line that re-invokes this binary with `args`.
    pub fn self_command(&self, args: &[&str]) -> String {
        std::iter::once(self.exe.as_str())
            .chain(self.forward_args.iter().map(String::as_str))
            .chain(args.iter().copied())
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn populate_prs(&mut self) {
        if self.flags.offline || !self.prs.needs_populate() {
            return;
        }
        let base = self.base_repo();
        let _spinner = Spinner::start_if(self.flags.progress(), "Fetching pull requests");
        self.prs
            .populate_bulk(self.api.as_ref(), &self.flags, base.as_ref(), &self.pr_states);
    }

    /// PR whose head is `reference`, from the bulk listing.
    pub fn lookup_pr(&mut self, reference: &str) -> Option<PullRequestSummary> {
        self.populate_prs();
        let branch = self.normalize_ref_to_branch(reference);
        self.prs.lookup(&branch).cloned()
    }

    pub fn pr_entries(&mut self) -> Vec<PullRequestSummary> {
        self.populate_prs();
        self.prs.entries().map(|(_, pr)| pr.clone()).collect()
    }

    /// Full PR record including labels, reviewers and body.
    pub fn pr_detail(&mut self, reference: &str) -> Option<PullRequestSummary> {
        self.populate_prs();
        let branch = self.normalize_ref_to_branch(reference);
        let base = self.base_repo();
        self.prs
            .fetch_detail(self.api.as_ref(), &self.flags, base.as_ref(), &branch)
    }

    pub fn prefetch_pr_details(&mut self, branches: &[String]) {
        if !self.flags.prefetch_details || self.flags.offline {
            return;
        }
        let normalized: Vec<String> = branches
            .iter()
            .map(|b| self.normalize_ref_to_branch(b))
            .collect();
        let base = self.base_repo();
        let _spinner = Spinner::start_if(self.flags.progress(), "Fetching PR details");
        self.prs.prefetch_details_bulk(
            self.api.as_ref(),
            &self.flags,
            base.as_ref(),
            &normalized,
            github::cache::PREFETCH_CHUNK,
        );
    }

    pub fn peek_checks(&mut self, sha: &str) -> Option<CiRunSummary> {
        self.checks.peek(&self.flags, sha)
    }

    pub fn fetch_checks(&mut self, sha: &str) -> Option<CiRunSummary> {
        let base = self.base_repo();
        self.checks
            .fetch(self.api.as_ref(), &self.flags, base.as_ref(), sha)
    }

    pub fn prefetch_checks(&mut self, shas: &[String]) {
        if !self.flags.checks_active() {
            return;
        }
        let base = self.base_repo();
        let _spinner = Spinner::start_if(self.flags.progress(), "Fetching CI status");
        self.checks.prefetch_bulk(
            self.api.as_ref(),
            &self.flags,
            base.as_ref(),
            shas,
            github::checks::PREFETCH_LIMIT,
        );
    }

    /// `None` when offline or without a GitHub remote.
    pub fn pushed_status(&self, branch: &str) -> Option<PushStatus> {
        if self.flags.offline {
            return None;
        }
        let base = self.base_repo()?;
        Some(github::pushed_status(self.api.as_ref(), &base, branch))
    }

    /// Login of the authenticated GitHub user.
    pub fn current_user(&self) -> Option<&str> {
        self.current_user
            .get_or_init(|| {
                if self.flags.offline {
                    return None;
                }
                match self.api.graphql("query { viewer { login } }", serde_json::json!({})) {
                    Ok(data) => data["viewer"]["login"].as_str().map(str::to_string),
                    Err(e) => {
                        log::debug!("viewer login unavailable: {}", e);
                        None
                    }
                }
            })
            .as_deref()
    }

    pub fn last_worktree_file(&self) -> PathBuf {
        self.cache_dir.join("last_worktree")
    }
}
