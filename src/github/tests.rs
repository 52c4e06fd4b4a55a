use super::api::mock::MockApi;
use super::cache::PR_FRESH_WINDOW;
use super::checks::CHECK_FRESH_WINDOW;
use super::*;
use crate::process::mock::MockRunner;
use crate::session::SessionFlags;
use serde_json::{json, Value};
use std::path::Path;
use std::rc::Rc;

const NOW: f64 = 1_700_000_000.0;

fn fixed_now() -> f64 {
    NOW
}

fn base() -> RepoSlug {
    RepoSlug::new("o", "r")
}

fn online() -> SessionFlags {
    SessionFlags::default()
}

fn with_checks() -> SessionFlags {
    SessionFlags {
        checks: true,
        ..SessionFlags::default()
    }
}

fn node(number: u64, branch: &str) -> Value {
    json!({
        "number": number,
        "state": "OPEN",
        "title": format!("PR {}", number),
        "isDraft": false,
        "headRefName": branch,
        "headRefOid": format!("sha{}", number),
        "author": { "login": "dev" },
        "baseRepository": { "owner": { "login": "o" }, "name": "r" }
    })
}

fn listing(nodes: Vec<Value>) -> Value {
    json!({ "repository": { "pullRequests": { "nodes": nodes } } })
}

fn write_snapshot(dir: &Path, timestamp: f64, states: &[&str]) {
    let pr = PullRequestSummary {
        number: 4,
        title: "cached".to_string(),
        head_branch: "topic".to_string(),
        base_owner: "o".to_string(),
        base_repo: "r".to_string(),
        ..PullRequestSummary::default()
    };
    let snapshot = json!({
        "timestamp": timestamp,
        "prs": { "topic": serde_json::to_value(&pr).unwrap() },
        "states": states,
    });
    std::fs::write(dir.join("prs.json"), snapshot.to_string()).unwrap();
}

#[test]
fn test_populate_bulk_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let api = Rc::new(MockApi::new().graphql_reply(listing(vec![node(1, "a"), node(2, "b")])));
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);

    cache.populate_bulk(&api, &online(), Some(&base()), &[PrState::Open]);
    cache.populate_bulk(&api, &online(), Some(&base()), &[PrState::Open]);

    assert_eq!(api.graphql_calls().len(), 1);
    assert_eq!(cache.lookup("b").map(|pr| pr.number), Some(2));
    assert_eq!(api.graphql_calls()[0].1["states"], json!(["OPEN"]));

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(cache.path()).unwrap()).unwrap();
    assert_eq!(written["timestamp"], json!(NOW));
    assert_eq!(written["states"], json!(["OPEN"]));
}

#[test]
fn test_fresh_snapshot_skips_network() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(dir.path(), NOW - PR_FRESH_WINDOW + 1.0, &["OPEN"]);
    let api = Rc::new(MockApi::new());
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);

    cache.populate_bulk(&api, &online(), Some(&base()), &[PrState::Open]);
    assert_eq!(api.call_count(), 0);
    assert_eq!(cache.lookup("topic").map(|pr| pr.title.as_str()), Some("cached"));
}

#[test]
fn test_stale_snapshot_refetches() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(dir.path(), NOW - PR_FRESH_WINDOW - 1.0, &["OPEN"]);
    let api = Rc::new(MockApi::new().graphql_reply(listing(vec![node(9, "fresh")])));
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);

    cache.populate_bulk(&api, &online(), Some(&base()), &[PrState::Open]);
    assert_eq!(api.graphql_calls().len(), 1);
    assert!(cache.lookup("topic").is_none());
    assert!(cache.lookup("fresh").is_some());
}

#[test]
fn test_snapshot_for_other_states_refetches() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(dir.path(), NOW, &["MERGED"]);
    let api = Rc::new(MockApi::new().graphql_reply(listing(vec![])));
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);

    cache.populate_bulk(&api, &online(), Some(&base()), &[PrState::Open]);
    assert_eq!(api.graphql_calls().len(), 1);
}

#[test]
fn test_unrecorded_states_reuse_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(dir.path(), NOW, &[]);
    let api = Rc::new(MockApi::new());
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);

    cache.populate_bulk(&api, &online(), Some(&base()), &[]);
    assert_eq!(api.call_count(), 0);
    assert!(!cache.is_empty());
}

#[test]
fn test_no_cache_removes_and_skips_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(dir.path(), NOW, &["OPEN"]);
    let api = Rc::new(MockApi::new().graphql_reply(listing(vec![node(1, "a")])));
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);
    let flags = SessionFlags {
        no_cache: true,
        ..SessionFlags::default()
    };

    cache.populate_bulk(&api, &flags, Some(&base()), &[PrState::Open]);
    assert_eq!(api.graphql_calls().len(), 1);
    assert!(cache.lookup("a").is_some());
    assert!(!cache.path().exists());
}

#[test]
fn test_refresh_ignores_snapshot_but_rewrites_it() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(dir.path(), NOW, &["OPEN"]);
    let api = Rc::new(MockApi::new().graphql_reply(listing(vec![node(1, "a")])));
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);
    let flags = SessionFlags {
        refresh: true,
        ..SessionFlags::default()
    };

    cache.populate_bulk(&api, &flags, Some(&base()), &[PrState::Open]);
    assert!(cache.lookup("topic").is_none());
    let written = std::fs::read_to_string(cache.path()).unwrap();
    assert!(written.contains("\"a\""));
}

#[test]
fn test_corrupt_snapshot_falls_through() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("prs.json"), "{ not json").unwrap();
    let api = Rc::new(MockApi::new().graphql_reply(listing(vec![node(1, "a")])));
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);

    cache.populate_bulk(&api, &online(), Some(&base()), &[PrState::Open]);
    assert!(cache.lookup("a").is_some());
}

#[test]
fn test_offline_and_failures_leave_cache_empty() {
    let dir = tempfile::tempdir().unwrap();
    let api = Rc::new(MockApi::new().graphql_failure());
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);
    let offline = SessionFlags {
        offline: true,
        ..SessionFlags::default()
    };

    cache.populate_bulk(&api, &offline, Some(&base()), &[PrState::Open]);
    assert_eq!(api.call_count(), 0);

    cache.populate_bulk(&api, &online(), Some(&base()), &[PrState::Open]);
    assert!(cache.is_empty());
    assert!(!cache.path().exists());
}

#[test]
fn test_fetch_detail_normalizes_and_caches() {
    let dir = tempfile::tempdir().unwrap();
    let mut detail = node(3, "feat");
    detail["body"] = json!("Details here");
    detail["labels"] = json!({ "nodes": [{ "name": "bug" }] });
    detail["reviewRequests"] = json!({ "nodes": [
        { "requestedReviewer": { "login": "alice" } },
        { "requestedReviewer": { "name": "core-team" } },
        { "requestedReviewer": null }
    ] });
    detail["latestReviews"] = json!({ "nodes": [{ "author": { "login": "bob" }, "state": "APPROVED" }] });
    let api = Rc::new(MockApi::new().graphql_reply(listing(vec![detail])));
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);

    let pr = cache
        .fetch_detail(&api, &online(), Some(&base()), "feat")
        .unwrap();
    assert_eq!(pr.labels, vec!["bug"]);
    assert_eq!(pr.requested_reviewers, vec!["alice", "core-team"]);
    assert_eq!(pr.latest_reviews.get("bob").map(String::as_str), Some("APPROVED"));
    assert_eq!(pr.body, "Details here");
    assert_eq!(pr.url().as_deref(), Some("https://github.com/o/r/pull/3"));
    assert_eq!(api.graphql_calls()[0].1["head"], json!("feat"));

    cache.fetch_detail(&api, &online(), Some(&base()), "feat");
    assert_eq!(api.graphql_calls().len(), 1);
    assert!(cache.has_detail("feat"));
}

#[test]
fn test_fetch_detail_falls_back_to_bulk_entry() {
    let dir = tempfile::tempdir().unwrap();
    let api = Rc::new(
        MockApi::new()
            .graphql_reply(listing(vec![node(5, "feat")]))
            .graphql_failure(),
    );
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);
    cache.populate_bulk(&api, &online(), Some(&base()), &[PrState::Open]);

    let pr = cache.fetch_detail(&api, &online(), Some(&base()), "feat").unwrap();
    assert_eq!(pr.number, 5);
    assert!(pr.labels.is_empty());

    let offline = SessionFlags {
        offline: true,
        ..SessionFlags::default()
    };
    let calls = api.graphql_calls().len();
    assert_eq!(
        cache.fetch_detail(&api, &offline, Some(&base()), "feat").map(|pr| pr.number),
        Some(5)
    );
    assert_eq!(api.graphql_calls().len(), calls);
    assert!(cache.fetch_detail(&api, &offline, Some(&base()), "other").is_none());
}

#[test]
fn test_prefetch_details_uses_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let api = Rc::new(MockApi::new().graphql_reply(json!({ "repository": {
        "r0": { "nodes": [node(1, "a")] },
        "r1": { "nodes": [] }
    } })));
    let mut cache = PrCache::new(dir.path()).with_clock(fixed_now);
    let branches: Vec<String> = ["a", "b", "a"].iter().map(|s| s.to_string()).collect();

    cache.prefetch_details_bulk(&api, &online(), Some(&base()), &branches, 20);
    let calls = api.graphql_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1["r0"], json!("a"));
    assert_eq!(calls[0].1["r1"], json!("b"));
    assert!(calls[0].1.get("r2").is_none());
    assert!(calls[0].0.contains("r1: pullRequests(headRefName: $r1"));
    assert!(cache.has_detail("a"));
    assert!(!cache.has_detail("b"));

    cache.prefetch_details_bulk(&api, &online(), Some(&base()), &branches[..1], 20);
    assert_eq!(api.graphql_calls().len(), 1);
}

#[test]
fn test_prefetch_details_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let api = Rc::new(
        MockApi::new()
            .graphql_reply(json!({ "repository": {} }))
            .graphql_reply(json!({ "repository": {} })),
    );
    let mut cache = PrCache::new(dir.path());
    let branches: Vec<String> = (0..3).map(|i| format!("b{}", i)).collect();

    cache.prefetch_details_bulk(&api, &online(), Some(&base()), &branches, 2);
    assert_eq!(api.graphql_calls().len(), 2);
}

fn run_body(conclusion: &str) -> String {
    json!({ "workflow_runs": [{
        "status": "completed",
        "conclusion": conclusion,
        "name": "CI",
        "html_url": "https://github.com/o/r/actions/runs/1",
        "id": 1,
        "updated_at": "2024-01-01T00:00:00Z"
    }] })
    .to_string()
}

fn runs_path(sha: &str) -> String {
    format!(
        "/repos/o/r/actions/runs?per_page=20&exclude_pull_requests=true&head_sha={}",
        sha
    )
}

#[test]
fn test_checks_disabled_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let api = Rc::new(MockApi::new().get_reply(&runs_path("abc"), 200, &run_body("success")));
    let mut checks = CheckCache::new(dir.path());

    assert!(checks.fetch(&api, &online(), Some(&base()), "abc").is_none());
    assert!(checks.peek(&online(), "abc").is_none());
    checks.prefetch_bulk(&api, &online(), Some(&base()), &["abc".to_string()], 20);
    assert_eq!(api.call_count(), 0);
}

#[test]
fn test_check_fetch_then_cached() {
    let dir = tempfile::tempdir().unwrap();
    let api = Rc::new(MockApi::new().get_reply(&runs_path("abc"), 200, &run_body("failure")));
    let mut checks = CheckCache::new(dir.path()).with_clock(fixed_now);

    let run = checks.fetch(&api, &with_checks(), Some(&base()), "abc").unwrap();
    assert_eq!(checks::ci_label(&run).0, "Failed");
    checks.fetch(&api, &with_checks(), Some(&base()), "abc");
    assert_eq!(api.get_calls().len(), 1);
    assert!(dir.path().join("actions.json").exists());

    let mut reloaded = CheckCache::new(dir.path()).with_clock(fixed_now);
    assert_eq!(reloaded.peek(&with_checks(), "abc"), Some(run));
}

#[test]
fn test_check_peek_shows_stale_entry_and_fetch_refreshes() {
    let dir = tempfile::tempdir().unwrap();
    let stale = json!({ "abc": {
        "timestamp": NOW - CHECK_FRESH_WINDOW - 10.0,
        "data": { "status": "in_progress" }
    } });
    std::fs::write(dir.path().join("actions.json"), stale.to_string()).unwrap();
    let api = Rc::new(MockApi::new().get_reply(&runs_path("abc"), 200, &run_body("success")));
    let mut checks = CheckCache::new(dir.path()).with_clock(fixed_now);

    let peeked = checks.peek(&with_checks(), "abc").unwrap();
    assert_eq!(checks::ci_label(&peeked).0, "In progress");
    assert_eq!(api.call_count(), 0);

    let fetched = checks.fetch(&api, &with_checks(), Some(&base()), "abc").unwrap();
    assert_eq!(checks::ci_label(&fetched).0, "Success");
    assert_eq!(api.get_calls().len(), 1);
}

#[test]
fn test_check_peek_ignores_disk_when_bypassing() {
    let dir = tempfile::tempdir().unwrap();
    let cached = json!({ "abc": { "timestamp": NOW, "data": { "status": "completed", "conclusion": "success" } } });
    std::fs::write(dir.path().join("actions.json"), cached.to_string()).unwrap();

    for flags in [
        SessionFlags { refresh: true, ..with_checks() },
        SessionFlags { no_cache: true, ..with_checks() },
    ] {
        let mut checks = CheckCache::new(dir.path()).with_clock(fixed_now);
        assert!(checks.peek(&flags, "abc").is_none());
    }
    let mut checks = CheckCache::new(dir.path()).with_clock(fixed_now);
    assert!(checks.peek(&with_checks(), "abc").is_some());
}

#[test]
fn test_check_refresh_rewrites_cache_file() {
    let dir = tempfile::tempdir().unwrap();
    let old = json!({
        "gone": { "timestamp": NOW - 10.0, "data": { "status": "completed", "conclusion": "failure" } },
        "abc": { "timestamp": NOW - 10.0, "data": { "status": "in_progress" } }
    });
    std::fs::write(dir.path().join("actions.json"), old.to_string()).unwrap();
    let api = Rc::new(MockApi::new().get_reply(&runs_path("abc"), 200, &run_body("success")));
    let mut checks = CheckCache::new(dir.path()).with_clock(fixed_now);
    let refresh = SessionFlags {
        refresh: true,
        ..with_checks()
    };

    let run = checks.fetch(&api, &refresh, Some(&base()), "abc").unwrap();
    assert_eq!(checks::ci_label(&run).0, "Success");

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("actions.json")).unwrap()).unwrap();
    assert!(written.get("gone").is_none());
    assert_eq!(written["abc"]["data"]["conclusion"], json!("success"));
}

#[test]
fn test_check_prefetch_dedupes_and_limits() {
    let dir = tempfile::tempdir().unwrap();
    let api = Rc::new(MockApi::new());
    let mut checks = CheckCache::new(dir.path()).with_clock(fixed_now);
    let shas: Vec<String> = ["a", "a", "", "b", "c"].iter().map(|s| s.to_string()).collect();

    checks.prefetch_bulk(&api, &with_checks(), Some(&base()), &shas, 2);
    assert_eq!(api.get_calls(), vec![runs_path("a"), runs_path("b")]);
}

#[test]
fn test_pushed_status() {
    let api = Rc::new(
        MockApi::new()
            .get_reply("/repos/o/r/branches/feature%2Fx", 200, "{}")
            .get_reply("/repos/o/r/branches/flaky", 502, ""),
    );
    assert_eq!(pushed_status(&api, &base(), "feature/x"), PushStatus::Pushed);
    assert_eq!(pushed_status(&api, &base(), "local-only"), PushStatus::NotPushed);
    assert_eq!(pushed_status(&api, &base(), "flaky"), PushStatus::Unknown);
}

#[test]
fn test_parse_remote_url_shapes() {
    let expected = Some(RepoSlug::new("owner", "repo"));
    assert_eq!(parse_remote_url("git@github.com:owner/repo.git"), expected);
    assert_eq!(parse_remote_url("https://github.com/owner/repo"), expected);
    assert_eq!(parse_remote_url("https://github.com/owner/repo.git\n"), expected);
    assert_eq!(parse_remote_url("ssh://git@github.com/owner/repo.git"), expected);
    assert_eq!(parse_remote_url("/srv/git/repo.git"), None);
    assert_eq!(parse_remote_url("https://github.com/owner"), None);
}

#[test]
fn test_base_remote_prefers_upstream_then_origin() {
    let remotes: Vec<String> = ["fork", "origin", "upstream"].iter().map(|s| s.to_string()).collect();
    assert_eq!(remote::candidate_order(&remotes), vec!["upstream", "origin", "fork"]);

    let runner = Rc::new(
        MockRunner::new()
            .respond("git remote get-url upstream", "/srv/mirror.git\n")
            .respond("git remote get-url origin", "git@github.com:me/tool.git\n")
            .respond("git remote get-url fork", "git@github.com:fork/tool.git\n"),
    );
    let (name, slug) = detect_base_remote(&runner, &remotes).unwrap();
    assert_eq!(name, "origin");
    assert_eq!(slug, RepoSlug::new("me", "tool"));
    assert_eq!(detect_base_remote(&runner, &[]), None);
}
