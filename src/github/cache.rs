use crate::github::api::GitHubApi;
use crate::github::types::{PrNode, PrState, PullRequestSummary, RepoSlug};
use crate::session::SessionFlags;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Age in seconds after which a PR snapshot on disk is refetched.
pub const PR_FRESH_WINDOW: f64 = 3000.0;

pub const PREFETCH_CHUNK: usize = 20;

const SUMMARY_FIELDS: &str = "url number state title isDraft mergedAt headRefName headRefOid \
     author { login } baseRepository { owner { login } name }";

const DETAIL_FIELDS: &str = "body labels(first: 5) { nodes { name } } \
     reviewRequests(first: 5) { nodes { requestedReviewer { ... on User { login } ... on Team { name } } } } \
     latestReviews(first: 10) { nodes { author { login } state } }";

pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    timestamp: f64,
    #[serde(default)]
    prs: BTreeMap<String, PullRequestSummary>,
    /// States the listing was fetched for; empty when unrecorded.
    #[serde(default)]
    states: Vec<PrState>,
}

/// Pull requests keyed by head branch, backed by `prs.json`.
pub struct PrCache {
    path: PathBuf,
    prs: BTreeMap<String, PullRequestSummary>,
    details: BTreeMap<String, PullRequestSummary>,
    attempted: bool,
    clock: fn() -> f64,
}

impl PrCache {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join("prs.json"),
            prs: BTreeMap::new(),
            details: BTreeMap::new(),
            attempted: false,
            clock: now_secs,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> f64) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fill the branch map once per process: from a fresh snapshot on disk,
    /// otherwise with a single bulk query.
    pub fn populate_bulk(
        &mut self,
        api: &dyn GitHubApi,
        flags: &SessionFlags,
        base: Option<&RepoSlug>,
        states: &[PrState],
    ) {
        if flags.offline || self.attempted || !self.prs.is_empty() {
            return;
        }
        self.attempted = true;

        if flags.bypass_cache() {
            self.clear();
            self.attempted = true;
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::debug!("could not remove {}: {}", self.path.display(), e);
                }
            }
        } else if let Some(snapshot) = self.read_snapshot() {
            let age = (self.clock)() - snapshot.timestamp;
            let same_states = snapshot.states.is_empty() || snapshot.states == normalize_states(states);
            if age < PR_FRESH_WINDOW && same_states {
                log::debug!("using PR snapshot ({} entries, {:.0}s old)", snapshot.prs.len(), age);
                self.prs = snapshot.prs;
                return;
            }
            log::debug!("PR snapshot not reusable ({:.0}s old)", age);
        }

        let Some(base) = base else {
            log::debug!("no GitHub remote; skipping PR fetch");
            return;
        };
        match fetch_bulk(api, base, states) {
            Some(prs) => {
                self.prs = prs;
                if !flags.no_cache {
                    self.write_snapshot(states);
                }
            }
            None => log::debug!("PR list unavailable"),
        }
    }

    pub fn lookup(&self, branch: &str) -> Option<&PullRequestSummary> {
        self.prs.get(branch)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &PullRequestSummary)> {
        self.prs.iter()
    }

    /// Whether `populate_bulk` still has work to do.
    pub fn needs_populate(&self) -> bool {
        !self.attempted && self.prs.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.prs.is_empty()
    }

    /// Full record for `branch`, which must already be a bare branch name.
    ///
    /// Detail results stay in memory. Offline, or when the query fails, the
    /// bulk entry is returned instead.
    pub fn fetch_detail(
        &mut self,
        api: &dyn GitHubApi,
        flags: &SessionFlags,
        base: Option<&RepoSlug>,
        branch: &str,
    ) -> Option<PullRequestSummary> {
        if let Some(pr) = self.details.get(branch) {
            return Some(pr.clone());
        }
        let fallback = self.prs.get(branch).cloned();
        if flags.offline {
            return fallback;
        }
        let Some(base) = base else {
            return fallback;
        };

        let query = format!(
            "query($owner: String!, $name: String!, $head: String!) {{ \
             repository(owner: $owner, name: $name) {{ {} }} }}",
            detail_selection("pullRequests", "$head")
        );
        let vars = json!({ "owner": base.owner, "name": base.repo, "head": branch });
        match api.graphql(&query, vars) {
            Ok(data) => match first_node(&data["repository"]["pullRequests"]) {
                Some(pr) => {
                    self.details.insert(branch.to_string(), pr.clone());
                    Some(pr)
                }
                None => fallback,
            },
            Err(e) => {
                log::debug!("PR detail for {} unavailable: {}", branch, e);
                fallback
            }
        }
    }

    /// Load detail records for many branches using aliased queries, `chunk`
    /// branches per request. Failed chunks are skipped.
    pub fn prefetch_details_bulk(
        &mut self,
        api: &dyn GitHubApi,
        flags: &SessionFlags,
        base: Option<&RepoSlug>,
        branches: &[String],
        chunk: usize,
    ) {
        if flags.offline {
            return;
        }
        let Some(base) = base else { return };
        let mut seen = std::collections::BTreeSet::new();
        let pending: Vec<&String> = branches
            .iter()
            .filter(|b| !self.details.contains_key(b.as_str()) && seen.insert(b.as_str()))
            .collect();

        for group in pending.chunks(chunk.max(1)) {
            let mut params = vec!["$owner: String!".to_string(), "$name: String!".to_string()];
            let mut selections = Vec::new();
            let mut vars = Map::new();
            vars.insert("owner".into(), Value::from(base.owner.as_str()));
            vars.insert("name".into(), Value::from(base.repo.as_str()));
            for (i, branch) in group.iter().enumerate() {
                params.push(format!("$r{}: String!", i));
                selections.push(format!(
                    "r{}: {}",
                    i,
                    detail_selection("pullRequests", &format!("$r{}", i))
                ));
                vars.insert(format!("r{}", i), Value::from(branch.as_str()));
            }
            let query = format!(
                "query({}) {{ repository(owner: $owner, name: $name) {{ {} }} }}",
                params.join(", "),
                selections.join(" ")
            );

            let data = match api.graphql(&query, Value::Object(vars)) {
                Ok(data) => data,
                Err(e) => {
                    log::debug!("detail prefetch chunk failed: {}", e);
                    continue;
                }
            };
            for (i, branch) in group.iter().enumerate() {
                if let Some(pr) = first_node(&data["repository"][format!("r{}", i)]) {
                    self.details.insert(branch.to_string(), pr);
                }
            }
        }
    }

    #[cfg(test)]
    pub fn has_detail(&self, branch: &str) -> bool {
        self.details.contains_key(branch)
    }

    /// Forget everything held in memory.
    pub fn clear(&mut self) {
        self.prs.clear();
        self.details.clear();
        self.attempted = false;
    }

    fn read_snapshot(&self) -> Option<Snapshot> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::debug!("discarding unreadable {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn write_snapshot(&self, states: &[PrState]) {
        let snapshot = Snapshot {
            timestamp: (self.clock)(),
            prs: self.prs.clone(),
            states: normalize_states(states),
        };
        if let Err(e) = write_json(&self.path, &snapshot) {
            log::debug!("could not write {}: {}", self.path.display(), e);
        }
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> crate::errors::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serde_json::to_string(value)?)?;
    Ok(())
}

fn normalize_states(states: &[PrState]) -> Vec<PrState> {
    let mut states = if states.is_empty() {
        PrState::ALL.to_vec()
    } else {
        states.to_vec()
    };
    states.sort();
    states.dedup();
    states
}

fn detail_selection(field: &str, head_var: &str) -> String {
    format!(
        "{}(headRefName: {}, states: [OPEN, CLOSED, MERGED], first: 1, \
         orderBy: {{ field: CREATED_AT, direction: DESC }}) {{ nodes {{ {} {} }} }}",
        field, head_var, SUMMARY_FIELDS, DETAIL_FIELDS
    )
}

fn first_node(connection: &Value) -> Option<PullRequestSummary> {
    let node = connection["nodes"].as_array()?.first()?.clone();
    match serde_json::from_value::<PrNode>(node) {
        Ok(node) => Some(node.into()),
        Err(e) => {
            log::debug!("skipping malformed PR node: {}", e);
            None
        }
    }
}

fn fetch_bulk(
    api: &dyn GitHubApi,
    base: &RepoSlug,
    states: &[PrState],
) -> Option<BTreeMap<String, PullRequestSummary>> {
    let states: Vec<&str> = normalize_states(states)
        .iter()
        .map(PrState::as_graphql)
        .collect();
    let query = format!(
        "query($owner: String!, $name: String!, $states: [PullRequestState!]) {{ \
         repository(owner: $owner, name: $name) {{ \
         pullRequests(first: 100, states: $states, orderBy: {{ field: UPDATED_AT, direction: DESC }}) \
         {{ nodes {{ {} }} }} }} }}",
        SUMMARY_FIELDS
    );
    let vars = json!({ "owner": base.owner, "name": base.repo, "states": states });

    let data = match api.graphql(&query, vars) {
        Ok(data) => data,
        Err(e) => {
            log::debug!("bulk PR query failed: {}", e);
            return None;
        }
    };
    let nodes = data["repository"]["pullRequests"]["nodes"].as_array()?;

    let mut prs = BTreeMap::new();
    for node in nodes {
        let Ok(node) = serde_json::from_value::<PrNode>(node.clone()) else {
            continue;
        };
        let pr = PullRequestSummary::from(node);
        if pr.head_branch.is_empty() {
            continue;
        }
        // Most recently updated PR wins for a reused branch name.
        prs.entry(pr.head_branch.clone()).or_insert(pr);
    }
    log::debug!("fetched {} pull requests for {}/{}", prs.len(), base.owner, base.repo);
    Some(prs)
}
