pub mod api;
pub mod cache;
pub mod checks;
pub mod cli;
pub mod remote;
pub mod types;

#[cfg(test)]
mod tests;

pub use api::{GitHubApi, UreqApi};
pub use cache::PrCache;
pub use checks::CheckCache;
pub use remote::{detect_base_remote, parse_remote_url};
pub use types::{CiRunSummary, PrState, PullRequestSummary, PushStatus, RepoSlug};

/// Whether `branch` exists on the base repository, via the REST branches
/// endpoint. Transport errors count as unknown.
pub fn pushed_status(api: &dyn GitHubApi, base: &RepoSlug, branch: &str) -> PushStatus {
    let path = format!(
        "/repos/{}/{}/branches/{}",
        base.owner,
        base.repo,
        branch.replace('/', "%2F")
    );
    match api.get(&path) {
        Ok(resp) => PushStatus::from_http_status(resp.status),
        Err(e) => {
            log::debug!("pushed status for {} unavailable: {}", branch, e);
            PushStatus::Unknown
        }
    }
}
