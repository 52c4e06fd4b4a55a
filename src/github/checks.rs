use crate::github::api::GitHubApi;
use crate::github::cache::{now_secs, write_json};
use crate::github::types::{CiRunSummary, RepoSlug, WorkflowRuns};
use crate::session::SessionFlags;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Age in seconds after which a cached CI run is refetched.
pub const CHECK_FRESH_WINDOW: f64 = 120.0;

pub const PREFETCH_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckEntry {
    timestamp: f64,
    data: Option<CiRunSummary>,
}

/// Latest workflow run per commit SHA, backed by `actions.json`.
pub struct CheckCache {
    path: PathBuf,
    memory: BTreeMap<String, CheckEntry>,
    disk: Option<BTreeMap<String, CheckEntry>>,
    clock: fn() -> f64,
}

impl CheckCache {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join("actions.json"),
            memory: BTreeMap::new(),
            disk: None,
            clock: now_secs,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> f64) -> Self {
        self.clock = clock;
        self
    }

    /// Cached run for `sha` without touching the network. Stale disk entries
    /// are still shown.
    pub fn peek(&mut self, flags: &SessionFlags, sha: &str) -> Option<CiRunSummary> {
        if !flags.checks_active() || sha.is_empty() {
            return None;
        }
        if let Some(entry) = self.memory.get(sha) {
            return entry.data.clone();
        }
        if flags.bypass_cache() {
            return None;
        }
        self.disk().get(sha).and_then(|entry| entry.data.clone())
    }

    /// Cached run if fresh, otherwise ask the Actions API.
    pub fn fetch(
        &mut self,
        api: &dyn GitHubApi,
        flags: &SessionFlags,
        base: Option<&RepoSlug>,
        sha: &str,
    ) -> Option<CiRunSummary> {
        if !flags.checks_active() || sha.is_empty() {
            return None;
        }
        if let Some(entry) = self.fresh_entry(flags, sha) {
            return entry.data;
        }
        let base = base?;

        let path = format!(
            "/repos/{}/{}/actions/runs?per_page=20&exclude_pull_requests=true&head_sha={}",
            base.owner, base.repo, sha
        );
        let resp = match api.get(&path) {
            Ok(resp) if resp.ok() => resp,
            Ok(resp) => {
                log::debug!("actions runs for {} returned {}", sha, resp.status);
                return None;
            }
            Err(e) => {
                log::debug!("actions runs for {} unavailable: {}", sha, e);
                return None;
            }
        };
        let runs: WorkflowRuns = match serde_json::from_str(&resp.body) {
            Ok(runs) => runs,
            Err(e) => {
                log::debug!("could not decode actions runs: {}", e);
                return None;
            }
        };
        let run = runs.workflow_runs.into_iter().next();

        let entry = CheckEntry {
            timestamp: (self.clock)(),
            data: run.clone(),
        };
        self.memory.insert(sha.to_string(), entry.clone());
        if !flags.no_cache {
            self.persist(flags, sha, entry);
        }
        run
    }

    /// Fetch runs for up to `limit` distinct SHAs that are not already fresh.
    pub fn prefetch_bulk(
        &mut self,
        api: &dyn GitHubApi,
        flags: &SessionFlags,
        base: Option<&RepoSlug>,
        shas: &[String],
        limit: usize,
    ) {
        if !flags.checks_active() || base.is_none() {
            return;
        }
        let mut seen = BTreeSet::new();
        let wanted: Vec<String> = shas
            .iter()
            .filter(|sha| !sha.is_empty() && seen.insert(sha.as_str()))
            .cloned()
            .collect();
        let mut fetched = 0;
        for sha in wanted {
            if fetched >= limit {
                break;
            }
            if self.fresh_entry(flags, &sha).is_some() {
                continue;
            }
            self.fetch(api, flags, base, &sha);
            fetched += 1;
        }
    }

    fn fresh_entry(&mut self, flags: &SessionFlags, sha: &str) -> Option<CheckEntry> {
        let now = (self.clock)();
        let is_fresh = |entry: &CheckEntry| now - entry.timestamp < CHECK_FRESH_WINDOW;

        if let Some(entry) = self.memory.get(sha).filter(|e| is_fresh(*e)) {
            return Some(entry.clone());
        }
        if flags.bypass_cache() {
            return None;
        }
        self.disk().get(sha).filter(|e| is_fresh(*e)).cloned()
    }

    fn disk(&mut self) -> &BTreeMap<String, CheckEntry> {
        let path = &self.path;
        self.disk.get_or_insert_with(|| {
            std::fs::read_to_string(path)
                .ok()
                .and_then(|raw| match serde_json::from_str(&raw) {
                    Ok(map) => Some(map),
                    Err(e) => {
                        log::debug!("discarding unreadable {}: {}", path.display(), e);
                        None
                    }
                })
                .unwrap_or_default()
        })
    }

    /// Write `entry` to `actions.json`. Under refresh the file is rebuilt from
    /// this run's fetches only.
    fn persist(&mut self, flags: &SessionFlags, sha: &str, entry: CheckEntry) {
        let mut map = if flags.bypass_cache() {
            self.memory.clone()
        } else {
            self.disk().clone()
        };
        map.insert(sha.to_string(), entry);
        if let Err(e) = write_json(&self.path, &map) {
            log::debug!("could not write {}: {}", self.path.display(), e);
        }
        self.disk = Some(map);
    }
}

/// Colour family of a CI glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Yellow,
    Red,
    Cyan,
}

/// Human label and colour for a workflow run.
pub fn ci_label(run: &CiRunSummary) -> (String, Tone) {
    let status = run.status.as_deref().unwrap_or("").to_lowercase();
    if matches!(status.as_str(), "queued" | "in_progress" | "waiting" | "requested" | "pending") {
        return ("In progress".to_string(), Tone::Yellow);
    }
    let conclusion = run.conclusion.as_deref().unwrap_or("").to_lowercase();
    match conclusion.as_str() {
        "success" => ("Success".to_string(), Tone::Green),
        "failure" | "timed_out" => ("Failed".to_string(), Tone::Red),
        "cancelled" => ("Cancelled".to_string(), Tone::Red),
        "neutral" | "skipped" => ("Skipped".to_string(), Tone::Cyan),
        "" if status.is_empty() => ("Unknown".to_string(), Tone::Yellow),
        "" => (title_case(&status), Tone::Yellow),
        other => (title_case(other), Tone::Yellow),
    }
}

fn title_case(value: &str) -> String {
    value
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
