//! Dependency resolution over local and remote trees

use pretty_assertions::assert_eq;
use repo_core::{DepsOptions, DepsReport, DepsResolver, Error};
use repo_test_utils::{TestRepo, TestServer};
use repo_tree::{Layout, ObjectTree, PathPattern};

fn deps(
    tree: &dyn ObjectTree,
    layout: Layout,
    options: DepsOptions,
    patterns: &[&str],
) -> DepsReport {
    let patterns: Vec<PathPattern> = patterns.iter().map(PathPattern::new).collect();
    DepsResolver::new(tree, layout).run(&patterns, &options).unwrap()
}

fn lines(report: &DepsReport) -> Vec<String> {
    report.lines.iter().map(ToString::to_string).collect()
}

fn web_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.node("web01", "prod", &["role[base]", "recipe[nginx::ssl]"]);
    repo.environment("prod");
    repo.role("base", &["apt"]);
    repo.cookbook("nginx", "1.0.0", &["apt"]);
    repo.cookbook("apt", "1.0.0", &[]);
    repo
}

const TREE: DepsOptions = DepsOptions {
    tree: true,
    recurse: true,
};

// ============================================================================
// Flat output
// ============================================================================

#[test]
fn test_flat_is_post_order_and_unique() {
    let repo = web_repo();
    let local = repo.tree(Layout::default());

    let report = deps(&local, Layout::default(), DepsOptions::default(), &["/nodes/web01.json"]);

    assert!(report.success());
    assert_eq!(
        lines(&report),
        vec![
            "/environments/prod.json",
            "/cookbooks/apt",
            "/roles/base.json",
            "/cookbooks/nginx",
            "/nodes/web01.json",
        ]
    );
}

#[test]
fn test_flat_shares_visited_set_across_start_paths() {
    let repo = web_repo();
    let local = repo.tree(Layout::default());

    let report = deps(
        &local,
        Layout::default(),
        DepsOptions::default(),
        &["/cookbooks/nginx", "/roles/base.json"],
    );

    assert_eq!(
        lines(&report),
        vec!["/cookbooks/apt", "/cookbooks/nginx", "/roles/base.json"]
    );
}

#[test]
fn test_default_environment_is_not_a_dependency() {
    let repo = TestRepo::new();
    repo.node("web01", "_default", &[]);
    let local = repo.tree(Layout::default());

    let report = deps(&local, Layout::default(), DepsOptions::default(), &["/nodes/*"]);

    assert_eq!(lines(&report), vec!["/nodes/web01.json"]);
}

#[test]
fn test_role_env_run_lists_are_followed() {
    let repo = TestRepo::new();
    repo.write_json(
        "roles/web.json",
        &serde_json::json!({
            "name": "web",
            "run_list": ["recipe[nginx]"],
            "env_run_lists": { "prod": ["recipe[apt]", "recipe[nginx]"] },
        }),
    );
    repo.cookbook("nginx", "1.0.0", &[]);
    repo.cookbook("apt", "1.0.0", &[]);
    let local = repo.tree(Layout::default());

    let report = deps(&local, Layout::default(), DepsOptions::default(), &["/roles/web.json"]);

    assert_eq!(
        lines(&report),
        vec!["/cookbooks/nginx", "/cookbooks/apt", "/roles/web.json"]
    );
}

#[test]
fn test_missing_dependency_is_printed_and_recorded() {
    let repo = TestRepo::new();
    repo.role("app", &["recipe[ghost]"]);
    let local = repo.tree(Layout::default());

    let report = deps(&local, Layout::default(), DepsOptions::default(), &["/roles/app.json"]);

    assert_eq!(lines(&report), vec!["/cookbooks/ghost", "/roles/app.json"]);
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].as_str(), "/cookbooks/ghost");
    assert!(!report.success());
}

// ============================================================================
// Tree output
// ============================================================================

#[test]
fn test_tree_indents_children() {
    let repo = web_repo();
    let local = repo.tree(Layout::default());

    let report = deps(&local, Layout::default(), TREE, &["/nodes/web01.json"]);

    assert_eq!(
        lines(&report),
        vec![
            "/nodes/web01.json",
            "  /environments/prod.json",
            "  /roles/base.json",
            "    /cookbooks/apt",
            "  /cookbooks/nginx",
            "    /cookbooks/apt",
        ]
    );
}

#[test]
fn test_tree_stops_at_cycles() {
    let repo = TestRepo::new();
    repo.role("a", &["role[b]"]);
    repo.role("b", &["role[a]"]);
    let local = repo.tree(Layout::default());

    let report = deps(&local, Layout::default(), TREE, &["/roles/a.json"]);

    assert_eq!(
        lines(&report),
        vec!["/roles/a.json", "  /roles/b.json", "    /roles/a.json"]
    );
}

#[test]
fn test_tree_without_recurse_prints_direct_children() {
    let repo = web_repo();
    let local = repo.tree(Layout::default());
    let options = DepsOptions {
        tree: true,
        recurse: false,
    };

    let report = deps(&local, Layout::default(), options, &["/nodes/web01.json"]);

    assert_eq!(
        lines(&report),
        vec![
            "/nodes/web01.json",
            "  /environments/prod.json",
            "  /roles/base.json",
            "  /cookbooks/nginx",
        ]
    );
}

#[test]
fn test_no_recurse_without_tree_is_a_usage_error() {
    let repo = TestRepo::new();
    let local = repo.tree(Layout::default());
    let options = DepsOptions {
        tree: false,
        recurse: false,
    };

    let err = DepsResolver::new(&local, Layout::default())
        .run(&[PathPattern::new("/roles")], &options)
        .unwrap_err();

    assert!(matches!(err, Error::Usage(_)));
}

// ============================================================================
// Backends and layouts
// ============================================================================

#[test]
fn test_remote_dependencies() {
    let server = TestServer::new();
    server.role("base", &["recipe[nginx]"]);
    server.cookbook("nginx", "1.0.0", &["apt"]);
    server.cookbook("apt", "1.0.0", &[]);
    let remote = server.tree(Layout::default());

    let report = deps(&remote, Layout::default(), DepsOptions::default(), &["/roles/base.json"]);

    assert_eq!(
        lines(&report),
        vec!["/cookbooks/apt", "/cookbooks/nginx", "/roles/base.json"]
    );
}

#[test]
fn test_versioned_layout_picks_highest_version() {
    let layout = Layout {
        versioned_cookbooks: true,
        ..Layout::default()
    };
    let repo = TestRepo::new();
    repo.cookbook_in("cookbooks/nginx-1.0.0", "nginx", "1.0.0", &["apt"]);
    repo.cookbook_in("cookbooks/apt-1.0.0", "apt", "1.0.0", &[]);
    repo.cookbook_in("cookbooks/apt-2.0.0", "apt", "2.0.0", &[]);
    let local = repo.tree(layout);

    let report = deps(&local, layout, DepsOptions::default(), &["/cookbooks/nginx-1.0.0"]);

    assert_eq!(
        lines(&report),
        vec!["/cookbooks/apt-2.0.0", "/cookbooks/nginx-1.0.0"]
    );
}
