//! Delete across the server and the repository

use pretty_assertions::assert_eq;
use repo_core::{DeleteOptions, DeleteReport, DeleteSides, delete};
use repo_test_utils::{TestRepo, TestServer};
use repo_tree::{Layout, ObjectTree, PathPattern};

fn run(
    trees: &[&dyn ObjectTree],
    sides: DeleteSides,
    recursive: bool,
    patterns: &[&str],
) -> DeleteReport {
    let patterns: Vec<PathPattern> = patterns.iter().map(PathPattern::new).collect();
    delete(trees, &patterns, &DeleteOptions { sides, recursive })
}

fn lines(report: &DeleteReport) -> Vec<String> {
    report.outcomes.iter().map(ToString::to_string).collect()
}

#[test]
fn test_delete_remote_only_by_default() {
    let repo = TestRepo::new();
    repo.role("web", &[]);
    let server = TestServer::new();
    server.role("web", &[]);
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    let report = run(
        &[&local, &remote],
        DeleteSides::default(),
        false,
        &["/roles/web.json"],
    );

    assert!(report.success());
    assert_eq!(lines(&report), vec!["Deleted /roles/web.json"]);
    assert!(!server.exists("/roles/web"));
    repo.assert_file_exists("roles/web.json");
}

#[test]
fn test_delete_both_reports_once() {
    let repo = TestRepo::new();
    repo.role("web", &[]);
    let server = TestServer::new();
    server.role("web", &[]);
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    let report = run(&[&local, &remote], DeleteSides::Both, false, &["/roles/web.json"]);

    assert_eq!(lines(&report), vec!["Deleted /roles/web.json"]);
    assert!(!server.exists("/roles/web"));
    repo.assert_file_not_exists("roles/web.json");
}

#[test]
fn test_delete_missing_everywhere() {
    let repo = TestRepo::new();
    let server = TestServer::new();
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    let report = run(&[&local, &remote], DeleteSides::Both, false, &["/roles/ghost.json"]);

    assert!(!report.success());
    assert_eq!(
        lines(&report),
        vec!["/roles/ghost.json: No such file or directory"]
    );
}

#[test]
fn test_default_environment_fails_remotely_but_deletes_locally() {
    let repo = TestRepo::new();
    repo.environment("_default");
    let server = TestServer::new();
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    let report = run(
        &[&local, &remote],
        DeleteSides::Both,
        false,
        &["/environments/_default.json"],
    );

    assert!(!report.success());
    assert_eq!(
        lines(&report),
        vec![
            "/environments/_default.json (remote) cannot be deleted (default environment cannot be modified).",
            "Deleted /environments/_default.json",
        ]
    );
    repo.assert_file_not_exists("environments/_default.json");
}

#[test]
fn test_non_empty_container_needs_recursive() {
    let repo = TestRepo::new();
    repo.write_json("data_bags/users/alice.json", &serde_json::json!({"id": "alice"}));
    let local = repo.tree(Layout::default());

    let refused = run(&[&local], DeleteSides::Local, false, &["/data_bags/users"]);
    assert_eq!(
        lines(&refused),
        vec!["/data_bags/users (local) must be deleted recursively!  Pass -r to knife delete."]
    );
    repo.assert_file_exists("data_bags/users/alice.json");

    let deleted = run(&[&local], DeleteSides::Local, true, &["/data_bags/users"]);
    assert_eq!(lines(&deleted), vec!["Deleted /data_bags/users"]);
    repo.assert_file_not_exists("data_bags/users");
}

#[test]
fn test_top_level_directories_are_protected() {
    let repo = TestRepo::new();
    let local = repo.tree(Layout::default());

    let report = run(&[&local], DeleteSides::Local, true, &["/roles"]);

    assert_eq!(lines(&report), vec!["/roles (local) cannot be deleted."]);
}

#[test]
fn test_wildcards_expand_per_side() {
    let repo = TestRepo::new();
    repo.role("web1", &[]);
    let server = TestServer::new();
    server.role("web2", &[]);
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    let report = run(&[&local, &remote], DeleteSides::Both, false, &["/roles/web*"]);

    assert_eq!(
        lines(&report),
        vec!["Deleted /roles/web1.json", "Deleted /roles/web2.json"]
    );
}
