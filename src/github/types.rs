use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `owner/name` of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn web_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }

    pub fn commit_url(&self, sha: &str) -> String {
        format!("{}/commit/{}", self.web_url(), sha)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrState {
    #[default]
    #[serde(alias = "open")]
    Open,
    #[serde(alias = "closed")]
    Closed,
    #[serde(alias = "merged")]
    Merged,
}

impl PrState {
    pub const ALL: [PrState; 3] = [PrState::Open, PrState::Closed, PrState::Merged];

    pub fn as_graphql(&self) -> &'static str {
        match self {
            PrState::Open => "OPEN",
            PrState::Closed => "CLOSED",
            PrState::Merged => "MERGED",
        }
    }
}

/// Pull request data kept per head branch.
///
/// Bulk listings fill the core fields only; `labels`, reviewers and `body`
/// are present on records obtained through a detail query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
    pub state: PrState,
    pub title: String,
    pub is_draft: bool,
    pub merged_at: Option<String>,
    pub head_branch: String,
    pub head_sha: String,
    pub base_owner: String,
    pub base_repo: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub requested_reviewers: Vec<String>,
    #[serde(default)]
    pub latest_reviews: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

impl PullRequestSummary {
    pub fn base(&self) -> Option<RepoSlug> {
        if self.base_owner.is_empty() || self.base_repo.is_empty() {
            return None;
        }
        Some(RepoSlug::new(&self.base_owner, &self.base_repo))
    }

    pub fn url(&self) -> Option<String> {
        self.base()
            .map(|base| format!("{}/pull/{}", base.web_url(), self.number))
    }

    pub fn is_merged(&self) -> bool {
        self.state == PrState::Merged || (self.state == PrState::Closed && self.merged_at.is_some())
    }
}

/// Latest GitHub Actions run for a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiRunSummary {
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub name: Option<String>,
    pub html_url: Option<String>,
    pub id: Option<u64>,
    pub updated_at: Option<String>,
}

/// Whether a branch exists on the GitHub remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Pushed,
    NotPushed,
    Unknown,
}

impl PushStatus {
    pub fn from_http_status(code: u16) -> Self {
        match code {
            200 => PushStatus::Pushed,
            404 => PushStatus::NotPushed,
            _ => PushStatus::Unknown,
        }
    }
}

// GraphQL payload shapes.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrNode {
    pub number: u64,
    #[serde(default)]
    pub state: PrState,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_draft: bool,
    pub merged_at: Option<String>,
    #[serde(default)]
    pub head_ref_name: String,
    #[serde(default)]
    pub head_ref_oid: String,
    pub body: Option<String>,
    pub author: Option<Login>,
    pub base_repository: Option<BaseRepository>,
    pub labels: Option<Connection<Label>>,
    pub review_requests: Option<Connection<ReviewRequest>>,
    pub latest_reviews: Option<Connection<Review>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Login {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BaseRepository {
    pub owner: Login,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Label {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewRequest {
    pub requested_reviewer: Option<Reviewer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Reviewer {
    pub login: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Review {
    pub author: Option<Login>,
    pub state: String,
}

impl From<PrNode> for PullRequestSummary {
    fn from(node: PrNode) -> Self {
        let (base_owner, base_repo) = node
            .base_repository
            .map(|b| (b.owner.login, b.name))
            .unwrap_or_default();
        Self {
            number: node.number,
            state: node.state,
            title: node.title,
            is_draft: node.is_draft,
            merged_at: node.merged_at,
            head_branch: node.head_ref_name,
            head_sha: node.head_ref_oid,
            base_owner,
            base_repo,
            author: node.author.map(|a| a.login),
            labels: node
                .labels
                .map(|c| c.nodes.into_iter().map(|l| l.name).collect())
                .unwrap_or_default(),
            requested_reviewers: node
                .review_requests
                .map(|c| {
                    c.nodes
                        .into_iter()
                        .filter_map(|r| r.requested_reviewer)
                        .filter_map(|r| r.login.or(r.name))
                        .collect()
                })
                .unwrap_or_default(),
            latest_reviews: node
                .latest_reviews
                .map(|c| {
                    c.nodes
                        .into_iter()
                        .filter_map(|r| r.author.map(|a| (a.login, r.state)))
                        .collect()
                })
                .unwrap_or_default(),
            body: node.body.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WorkflowRuns {
    #[serde(default)]
    pub workflow_runs: Vec<CiRunSummary>,
}
