//! Whole-workflow properties of upload, download, diff, deps and delete
//!
//! Each test drives the engines the way the CLI does, against a temporary
//! repository and an in-memory server.

use pretty_assertions::assert_eq;
use repo_core::diff::name_line;
use repo_core::{
    DeleteOptions, DeleteSides, DepsOptions, DepsResolver, DiffFormat, DiffOptions, Differ,
    SyncEngine, SyncOptions, SyncReport,
};
use repo_test_utils::{TestRepo, TestServer};
use repo_tree::{ChefPath, Layout, ObjectTree, PathPattern};

fn patterns(paths: &[&str]) -> Vec<PathPattern> {
    paths.iter().map(PathPattern::new).collect()
}

fn sync(
    source: &dyn ObjectTree,
    destination: &dyn ObjectTree,
    options: SyncOptions,
    paths: &[&str],
) -> SyncReport {
    let report = SyncEngine::new(source, destination, Layout::default(), options)
        .run(&patterns(paths))
        .unwrap();
    assert!(report.success(), "{:?}", report.events);
    report
}

/// `--name-status` lines for `new` against `old`, leaving out the
/// `_default` environment, which neither side may change.
fn name_status(new: &dyn ObjectTree, old: &dyn ObjectTree, paths: &[&str]) -> Vec<String> {
    Differ::new(new, old, Layout::default(), DiffOptions::default())
        .diff(&patterns(paths))
        .changes()
        .filter(|entry| entry.path.as_str() != "/environments/_default.json")
        .map(|entry| name_line(entry, DiffFormat::NameStatus))
        .collect()
}

fn populated_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.role("base", &["recipe[apt]"]);
    repo.role("web", &["role[base]", "recipe[nginx]"]);
    repo.environment("prod");
    repo.node("web01", "prod", &["role[web]"]);
    repo.write_json(
        "data_bags/users/alice.json",
        &serde_json::json!({ "id": "alice", "shell": "/bin/zsh" }),
    );
    repo.cookbook("apt", "2.1.0", &[]);
    repo.cookbook("nginx", "1.4.0", &["apt"]);
    repo
}

// ============================================================================
// Round trip and idempotence
// ============================================================================

#[test]
fn test_round_trip_through_server() {
    let repo = populated_repo();
    let server = TestServer::new();
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    sync(&local, &remote, SyncOptions::default(), &["/"]);

    let copy = TestRepo::new();
    let copied = copy.tree(Layout::default());
    sync(&remote, &copied, SyncOptions::default(), &["/"]);

    assert_eq!(name_status(&copied, &remote, &["/"]), Vec::<String>::new());
    assert_eq!(name_status(&local, &copied, &["/"]), Vec::<String>::new());
}

#[test]
fn test_second_upload_is_silent() {
    let repo = populated_repo();
    let server = TestServer::new();
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    let first = sync(&local, &remote, SyncOptions::default(), &["/"]);
    assert!(first.changes().count() > 0);

    let second = sync(&local, &remote, SyncOptions::default(), &["/"]);
    assert_eq!(second.events, vec![]);
}

// ============================================================================
// Purge
// ============================================================================

fn server_with_extras() -> TestServer {
    let server = TestServer::new();
    server.role("legacy", &[]);
    server.cookbook("old", "0.1.0", &[]);
    server
}

#[test]
fn test_purge_leaves_nothing_to_diff() {
    let repo = populated_repo();
    let server = server_with_extras();
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    let purge = SyncOptions {
        purge: true,
        ..SyncOptions::default()
    };
    sync(&local, &remote, purge, &["/"]);

    assert_eq!(name_status(&local, &remote, &["/"]), Vec::<String>::new());
    assert!(!server.exists("/roles/legacy"));
}

#[test]
fn test_without_purge_extras_remain() {
    let repo = populated_repo();
    let server = server_with_extras();
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    sync(&local, &remote, SyncOptions::default(), &["/"]);

    assert_eq!(
        name_status(&local, &remote, &["/"]),
        vec!["D\t/cookbooks/old", "D\t/roles/legacy.json"]
    );
}

// ============================================================================
// Cookbook versions
// ============================================================================

#[test]
fn test_only_latest_versions_are_compared() {
    let repo = TestRepo::new();
    repo.cookbook("x", "1.0.0", &[]);
    let server = TestServer::new();
    server.cookbook("x", "1.0.0", &[]);
    server.cookbook("x", "1.0.1", &[]);
    let local = repo.tree(Layout::default());
    let remote = server.tree(Layout::default());

    assert_eq!(
        name_status(&local, &remote, &["/cookbooks"]),
        vec!["M\t/cookbooks/x/metadata.rb"]
    );

    sync(&remote, &local, SyncOptions::default(), &["/cookbooks/x"]);
    repo.assert_file_contains("cookbooks/x/metadata.rb", "version '1.0.1'");
}

// ============================================================================
// Deps
// ============================================================================

#[test]
fn test_role_cycle_prints_each_role_once() {
    let repo = TestRepo::new();
    repo.role("foo", &["role[bar]"]);
    repo.role("bar", &["role[baz]"]);
    repo.role("baz", &["role[foo]"]);
    let local = repo.tree(Layout::default());

    let report = DepsResolver::new(&local, Layout::default())
        .run(&patterns(&["/roles/foo.json"]), &DepsOptions::default())
        .unwrap();

    let lines: Vec<String> = report.lines.iter().map(|l| l.to_string()).collect();
    assert_eq!(
        lines,
        vec!["/roles/baz.json", "/roles/bar.json", "/roles/foo.json"]
    );
    assert!(report.success());
}

// ============================================================================
// chefignore
// ============================================================================

fn two_cookbooks_with_x_json() -> TestRepo {
    let repo = TestRepo::new();
    for name in ["cookbook1", "cookbook2"] {
        repo.cookbook(name, "1.0.0", &[]);
        repo.write(&format!("cookbooks/{}/x.json", name), "{}");
    }
    repo
}

fn has_x_json(tree: &dyn ObjectTree, cookbook: &str) -> bool {
    tree.list(&ChefPath::new(format!("/cookbooks/{}", cookbook)))
        .unwrap()
        .iter()
        .any(|name| name == "x.json")
}

#[test]
fn test_shared_chefignore_covers_every_cookbook() {
    let repo = two_cookbooks_with_x_json();
    repo.write("cookbooks/chefignore", "x.json\n");
    let local = repo.tree(Layout::default());

    assert!(!has_x_json(&local, "cookbook1"));
    assert!(!has_x_json(&local, "cookbook2"));
}

#[test]
fn test_cookbook_chefignore_covers_only_its_cookbook() {
    let repo = two_cookbooks_with_x_json();
    repo.write("cookbooks/cookbook1/chefignore", "x.json\n");
    let local = repo.tree(Layout::default());

    assert!(!has_x_json(&local, "cookbook1"));
    assert!(has_x_json(&local, "cookbook2"));
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn test_cookbook_delete_needs_recursion() {
    let repo = TestRepo::new();
    repo.cookbook("x", "1.0.0", &[]);
    let local = repo.tree(Layout::default());
    let trees: [&dyn ObjectTree; 1] = [&local];
    let targets = patterns(&["/cookbooks/x"]);

    let flat = DeleteOptions {
        sides: DeleteSides::Local,
        recursive: false,
    };
    let report = repo_core::delete(&trees, &targets, &flat);
    assert!(!report.success());
    assert_eq!(
        report.outcomes[0].to_string(),
        "/cookbooks/x (local) must be deleted recursively!  Pass -r to knife delete."
    );
    repo.assert_file_exists("cookbooks/x/metadata.rb");

    let recursive = DeleteOptions {
        recursive: true,
        ..flat
    };
    let report = repo_core::delete(&trees, &targets, &recursive);
    assert!(report.success());
    repo.assert_file_not_exists("cookbooks/x");
}
