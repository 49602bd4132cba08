//! Property tests: arbitrary roles and data bags survive upload + download

use std::collections::BTreeMap;

use proptest::prelude::*;
use repo_core::{DiffOptions, Differ, SyncEngine, SyncOptions};
use repo_test_utils::{TestRepo, TestServer};
use repo_tree::{Layout, ObjectTree, PathPattern};
use serde_json::json;

fn root() -> Vec<PathPattern> {
    vec![PathPattern::new("/")]
}

fn differing_paths(new: &dyn ObjectTree, old: &dyn ObjectTree) -> Vec<String> {
    Differ::new(new, old, Layout::default(), DiffOptions::default())
        .diff(&root())
        .changes()
        .map(|entry| entry.path.to_string())
        .filter(|path| path != "/environments/_default.json")
        .collect()
}

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn run_list_item() -> impl Strategy<Value = String> {
    prop_oneof![
        name().prop_map(|n| format!("recipe[{}]", n)),
        name().prop_map(|n| format!("role[{}]", n)),
    ]
}

fn roles() -> impl Strategy<Value = BTreeMap<String, Vec<String>>> {
    prop::collection::btree_map(name(), prop::collection::vec(run_list_item(), 0..4), 0..5)
}

fn bags() -> impl Strategy<Value = BTreeMap<String, Vec<String>>> {
    prop::collection::btree_map(name(), prop::collection::vec(name(), 1..3), 0..3)
}

fn build_repo(
    roles: &BTreeMap<String, Vec<String>>,
    bags: &BTreeMap<String, Vec<String>>,
) -> TestRepo {
    let repo = TestRepo::new();
    for (role, run_list) in roles {
        let items: Vec<&str> = run_list.iter().map(String::as_str).collect();
        repo.role(role, &items);
    }
    for (bag, items) in bags {
        for item in items {
            repo.write_json(
                &format!("data_bags/{}/{}.json", bag, item),
                &json!({ "id": item, "bag": bag }),
            );
        }
    }
    repo
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn upload_then_download_reproduces_the_repository(
        roles in roles(),
        bags in bags(),
    ) {
        let repo = build_repo(&roles, &bags);
        let server = TestServer::new();
        let local = repo.tree(Layout::default());
        let remote = server.tree(Layout::default());

        let upload = SyncEngine::new(&local, &remote, Layout::default(), SyncOptions::default())
            .run(&root())
            .unwrap();
        prop_assert!(upload.success(), "{:?}", upload.events);

        let copy = TestRepo::new();
        let copied = copy.tree(Layout::default());
        let download = SyncEngine::new(&remote, &copied, Layout::default(), SyncOptions::default())
            .run(&root())
            .unwrap();
        prop_assert!(download.success(), "{:?}", download.events);

        prop_assert_eq!(differing_paths(&copied, &remote), Vec::<String>::new());
        prop_assert_eq!(differing_paths(&local, &copied), Vec::<String>::new());
    }

    #[test]
    fn repeated_upload_reports_nothing(roles in roles()) {
        let repo = build_repo(&roles, &BTreeMap::new());
        let server = TestServer::new();
        let local = repo.tree(Layout::default());
        let remote = server.tree(Layout::default());
        let engine = SyncEngine::new(&local, &remote, Layout::default(), SyncOptions::default());

        let first = engine.run(&root()).unwrap();
        prop_assert_eq!(first.changes().count(), roles.len());

        let second = engine.run(&root()).unwrap();
        prop_assert!(second.events.is_empty(), "{:?}", second.events);
    }
}
