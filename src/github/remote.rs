use crate::git;
use crate::github::types::RepoSlug;
use crate::process::Runner;
use regex::Regex;
use std::sync::OnceLock;

fn remote_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:git@[^:/]+:|https://[^/]+/|ssh://git@[^/]+/)(?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?/?$",
        )
        .expect("static regex")
    })
}

/// Parse `git@host:owner/repo(.git)`, `https://host/owner/repo(.git)` or
/// `ssh://git@host/owner/repo(.git)`.
pub fn parse_remote_url(url: &str) -> Option<RepoSlug> {
    let caps = remote_url_re().captures(url.trim())?;
    let repo = &caps["repo"];
    if repo.is_empty() {
        return None;
    }
    Some(RepoSlug::new(&caps["owner"], repo))
}

/// Order in which remotes are tried: `upstream`, `origin`, then the rest as
/// listed.
pub fn candidate_order(remotes: &[String]) -> Vec<&str> {
    let mut ordered: Vec<&str> = ["upstream", "origin"]
        .into_iter()
        .filter(|c| remotes.iter().any(|r| r == c))
        .collect();
    ordered.extend(
        remotes
            .iter()
            .map(String::as_str)
            .filter(|r| *r != "upstream" && *r != "origin"),
    );
    ordered
}

/// First remote whose fetch URL names a repository, with that repository.
pub fn detect_base_remote(runner: &dyn Runner, remotes: &[String]) -> Option<(String, RepoSlug)> {
    for remote in candidate_order(remotes) {
        let Some(url) = git::remote_url(runner, remote) else {
            continue;
        };
        if let Some(slug) = parse_remote_url(&url) {
            log::debug!("base repository {}/{} from remote {}", slug.owner, slug.repo, remote);
            return Some((remote.to_string(), slug));
        }
    }
    None
}
