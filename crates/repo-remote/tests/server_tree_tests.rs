use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use repo_remote::{MemoryServer, RestApi, ServerTree};
use serde_json::Value;
use repo_tree::{
    ChefPath, Content, CookbookBundle, EntryKind, Error, Layout, ObjectTree, Refusal, RepoMode,
    WriteOptions,
};
use rstest::rstest;
use serde_json::json;

fn path(p: &str) -> ChefPath {
    ChefPath::new(p)
}

fn server() -> Arc<MemoryServer> {
    Arc::new(MemoryServer::new())
}

fn tree(server: &Arc<MemoryServer>, layout: Layout) -> ServerTree {
    ServerTree::new(server.clone(), layout)
}

fn hosted() -> Layout {
    Layout::new(RepoMode::HostedEverything, false)
}

fn bundle(name: &str, version: &str, extra: &[(&str, &str)]) -> CookbookBundle {
    let mut files = BTreeMap::new();
    files.insert(
        "metadata.rb".to_string(),
        format!("name '{}'\nversion '{}'\n", name, version).into_bytes(),
    );
    files.insert(
        "recipes/default.rb".to_string(),
        format!("log '{} {}'\n", name, version).into_bytes(),
    );
    for (relative, content) in extra {
        files.insert(relative.to_string(), content.as_bytes().to_vec());
    }
    CookbookBundle::from_files(name, files)
}

fn upload(tree: &ServerTree, dir_name: &str, bundle: &CookbookBundle, options: WriteOptions) {
    tree.create_child(
        &path("/cookbooks"),
        dir_name,
        Some(&Content::Cookbook(bundle.clone())),
        &options,
    )
    .unwrap();
}

// ============================================================================
// JSON documents
// ============================================================================

#[test]
fn test_document_lifecycle() {
    let server = server();
    let remote = tree(&server, Layout::default());
    let role = Content::Json(json!({ "name": "web", "run_list": ["apache2"] }));

    remote
        .create_child(&path("/roles"), "web.json", Some(&role), &WriteOptions::default())
        .unwrap();
    assert_eq!(remote.list(&path("/roles")).unwrap(), vec!["web.json"]);

    let stored = server.get("/roles/web").unwrap();
    assert_eq!(stored["run_list"], json!(["recipe[apache2]"]));
    assert_eq!(stored["chef_type"], json!("role"));

    let updated = Content::Json(json!({ "name": "web", "description": "front end" }));
    remote
        .update(&path("/roles/web.json"), &updated, &WriteOptions::default())
        .unwrap();
    assert_eq!(
        server.get("/roles/web").unwrap()["description"],
        json!("front end")
    );

    remote.delete(&path("/roles/web.json"), false).unwrap();
    assert_eq!(remote.kind(&path("/roles/web.json")).unwrap(), None);
}

#[test]
fn test_create_existing_document_is_refused() {
    let server = server();
    let remote = tree(&server, Layout::default());
    let err = remote
        .create_child(
            &path("/environments"),
            "_default.json",
            Some(&Content::Json(json!({}))),
            &WriteOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.refusal(), Some(&Refusal::AlreadyExists));
}

#[test]
fn test_data_bag_items_live_under_data() {
    let server = server();
    let remote = tree(&server, Layout::default());
    remote
        .create_child(&path("/data_bags"), "users", None, &WriteOptions::default())
        .unwrap();
    remote
        .create_child(
            &path("/data_bags/users"),
            "alice.json",
            Some(&Content::Json(json!({ "id": "alice", "shell": "/bin/zsh" }))),
            &WriteOptions::default(),
        )
        .unwrap();

    assert_eq!(server.get("/data/users/alice").unwrap()["shell"], "/bin/zsh");
    assert_eq!(
        remote.list(&path("/data_bags/users")).unwrap(),
        vec!["alice.json"]
    );

    let err = remote.delete(&path("/data_bags/users"), false).unwrap_err();
    assert_eq!(err.refusal(), Some(&Refusal::MustRecurse));
    remote.delete(&path("/data_bags/users"), true).unwrap();
    assert!(!remote.exists(&path("/data_bags/users")).unwrap());
}

#[test]
fn test_data_bag_item_id_must_match_file_name() {
    let server = server();
    let remote = tree(&server, Layout::default());
    remote
        .create_child(&path("/data_bags"), "users", None, &WriteOptions::default())
        .unwrap();
    let err = remote
        .create_child(
            &path("/data_bags/users"),
            "alice.json",
            Some(&Content::Json(json!({ "id": "bob" }))),
            &WriteOptions::default(),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "/data_bags/users/alice.json failed to create_child: Name must be 'alice' (is 'bob')"
    );
}

#[rstest]
#[case("/")]
#[case("/roles")]
fn test_system_paths_are_protected(#[case] target: &str) {
    let server = server();
    let remote = tree(&server, Layout::default());
    assert!(matches!(
        remote.delete(&path(target), true).unwrap_err().refusal(),
        Some(Refusal::Protected { .. })
    ));
}

#[test]
fn test_default_environment_cannot_be_modified() {
    let server = server();
    let remote = tree(&server, Layout::default());
    let target = path("/environments/_default.json");

    let err = remote.delete(&target, false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "/environments/_default.json cannot be deleted (default environment cannot be modified)."
    );
    let err = remote
        .update(&target, &Content::Json(json!({})), &WriteOptions::default())
        .unwrap_err();
    assert!(matches!(
        err.refusal(),
        Some(Refusal::DefaultEnvironment { .. })
    ));
}

#[test]
fn test_unparsed_content_is_refused_with_parse_error() {
    let server = server();
    let remote = tree(&server, Layout::default());
    let broken = Content::from_json_bytes(b"{ nope".to_vec());
    let err = remote
        .create_child(&path("/roles"), "x.json", Some(&broken), &WriteOptions::default())
        .unwrap_err();
    assert!(
        err.to_string()
            .starts_with("/roles/x.json failed to create_child: Parse error reading JSON:")
    );
}

// ============================================================================
// Policies and ACLs
// ============================================================================

#[test]
fn test_policy_revisions_are_immutable() {
    let server = server();
    let remote = tree(&server, hosted());
    remote
        .create_child(
            &path("/policies"),
            "app-abc123.json",
            Some(&Content::Json(json!({ "name": "app", "revision_id": "abc123" }))),
            &WriteOptions::default(),
        )
        .unwrap();

    assert_eq!(
        remote.list(&path("/policies")).unwrap(),
        vec!["app-abc123.json"]
    );
    let err = remote
        .update(
            &path("/policies/app-abc123.json"),
            &Content::Json(json!({ "name": "app", "revision_id": "abc123", "run_list": ["x"] })),
            &WriteOptions::default(),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "/policies/app-abc123.json cannot be updated: policy revisions are immutable once uploaded."
    );
    remote
        .delete(&path("/policies/app-abc123.json"), false)
        .unwrap();
    assert!(remote.list(&path("/policies")).unwrap().is_empty());
}

#[test]
fn test_acls_follow_objects_and_cannot_be_deleted() {
    let server = server();
    let remote = tree(&server, hosted());
    server.post("/roles", &json!({ "name": "web" })).unwrap();

    assert_eq!(
        remote.list(&path("/acls/roles")).unwrap(),
        vec!["web.json"]
    );
    assert!(
        remote
            .list(&path("/acls"))
            .unwrap()
            .contains(&"organization.json".to_string())
    );

    let acl = json!({ "read": { "actors": ["alice"], "groups": [] } });
    remote
        .update(
            &path("/acls/roles/web.json"),
            &Content::Json(acl),
            &WriteOptions::default(),
        )
        .unwrap();
    assert_eq!(
        server.get("/roles/web/_acl").unwrap()["read"]["actors"],
        json!(["alice"])
    );

    let err = remote.delete(&path("/acls/roles/web.json"), false).unwrap_err();
    assert!(matches!(err.refusal(), Some(Refusal::Protected { .. })));
}

#[test]
fn test_members_are_reconciled() {
    let server = server();
    let remote = tree(&server, hosted());
    server.post("/members", &json!({ "username": "alice" })).unwrap();
    server.post("/members", &json!({ "username": "carol" })).unwrap();

    remote
        .update(
            &path("/members.json"),
            &Content::Json(json!(["alice", "bob"])),
            &WriteOptions::default(),
        )
        .unwrap();

    let members = remote.read(&path("/members.json")).unwrap();
    let names = repo_tree::objects::normalize(
        repo_tree::ObjectKind::Members,
        "members",
        members.as_json().unwrap(),
    );
    assert_eq!(names, json!(["alice", "bob"]));
}

#[test]
fn test_org_singletons_cannot_be_deleted() {
    let server = server();
    let remote = tree(&server, hosted());
    for singleton in ["/org.json", "/members.json", "/invitations.json"] {
        let err = remote.delete(&path(singleton), false).unwrap_err();
        assert!(matches!(err.refusal(), Some(Refusal::Protected { .. })));
    }
}

// ============================================================================
// Cookbooks
// ============================================================================

#[test]
fn test_cookbook_resolves_to_latest_version() {
    let server = server();
    let remote = tree(&server, Layout::default());
    upload(&remote, "apache2", &bundle("apache2", "1.0.0", &[]), WriteOptions::default());
    remote
        .update(
            &path("/cookbooks/apache2"),
            &Content::Cookbook(bundle("apache2", "1.10.0", &[])),
            &WriteOptions::default(),
        )
        .unwrap();

    assert_eq!(remote.list(&path("/cookbooks")).unwrap(), vec!["apache2"]);
    let content = remote.read(&path("/cookbooks/apache2")).unwrap();
    assert_eq!(
        content.as_cookbook().unwrap().version,
        semver::Version::new(1, 10, 0)
    );
    let recipe = remote
        .read(&path("/cookbooks/apache2/recipes/default.rb"))
        .unwrap();
    assert_eq!(recipe, Content::Raw(b"log 'apache2 1.10.0'\n".to_vec()));

    remote.delete(&path("/cookbooks/apache2"), true).unwrap();
    let content = remote.read(&path("/cookbooks/apache2")).unwrap();
    assert_eq!(
        content.as_cookbook().unwrap().version,
        semver::Version::new(1, 0, 0)
    );
}

/// Forwards to a memory server, counting GETs of one endpoint.
struct CountingApi {
    server: Arc<MemoryServer>,
    endpoint: &'static str,
    hits: AtomicUsize,
}

impl RestApi for CountingApi {
    fn get(&self, path: &str) -> repo_remote::Result<Value> {
        if path == self.endpoint {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        self.server.get(path)
    }

    fn put(&self, path: &str, body: &Value) -> repo_remote::Result<Value> {
        self.server.put(path, body)
    }

    fn post(&self, path: &str, body: &Value) -> repo_remote::Result<Value> {
        self.server.post(path, body)
    }

    fn delete(&self, path: &str) -> repo_remote::Result<Value> {
        self.server.delete(path)
    }

    fn get_bytes(&self, path: &str) -> repo_remote::Result<Vec<u8>> {
        self.server.get_bytes(path)
    }

    fn put_bytes(&self, path: &str, body: &[u8]) -> repo_remote::Result<()> {
        self.server.put_bytes(path, body)
    }
}

#[test]
fn test_cookbook_manifest_is_fetched_once_per_tree() {
    let api = Arc::new(CountingApi {
        server: server(),
        endpoint: "/cookbooks/apache2/1.0.0",
        hits: AtomicUsize::new(0),
    });
    let remote = ServerTree::new(api.clone(), Layout::default());
    let extra = [("templates/site.erb", "<%= @port %>"), ("README.md", "hi")];
    upload(&remote, "apache2", &bundle("apache2", "1.0.0", &extra), WriteOptions::default());
    api.hits.store(0, Ordering::SeqCst);

    let cookbook = path("/cookbooks/apache2");
    assert_eq!(remote.kind(&cookbook).unwrap(), Some(EntryKind::Container));
    for name in remote.list(&cookbook).unwrap() {
        let child = cookbook.join(&name);
        match remote.kind(&child).unwrap() {
            Some(EntryKind::Container) => {
                for file in remote.list(&child).unwrap() {
                    remote.read(&child.join(&file)).unwrap();
                }
            }
            _ => {
                remote.read(&child).unwrap();
            }
        }
    }
    remote.read(&cookbook).unwrap();
    assert_eq!(api.hits.load(Ordering::SeqCst), 1);

    remote
        .update(
            &cookbook,
            &Content::Cookbook(bundle("apache2", "1.0.0", &[])),
            &WriteOptions::default(),
        )
        .unwrap();
    api.hits.store(0, Ordering::SeqCst);
    assert_eq!(remote.list(&cookbook).unwrap(), vec!["metadata.rb", "recipes"]);
    assert_eq!(api.hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_versioned_layout_lists_every_version() {
    let server = server();
    let remote = tree(&server, Layout::new(RepoMode::Everything, true));
    upload(&remote, "apache2-1.0.0", &bundle("apache2", "1.0.0", &[]), WriteOptions::default());
    upload(&remote, "apache2-2.0.0", &bundle("apache2", "2.0.0", &[]), WriteOptions::default());

    assert_eq!(
        remote.list(&path("/cookbooks")).unwrap(),
        vec!["apache2-1.0.0", "apache2-2.0.0"]
    );
    assert_eq!(
        remote.kind(&path("/cookbooks/apache2-1.0")).unwrap(),
        Some(EntryKind::Container)
    );
    assert_eq!(remote.kind(&path("/cookbooks/apache2-3.0.0")).unwrap(), None);
}

#[test]
fn test_cookbook_files_cannot_be_written_individually() {
    let server = server();
    let remote = tree(&server, Layout::default());
    upload(&remote, "apache2", &bundle("apache2", "1.0.0", &[]), WriteOptions::default());
    let file = path("/cookbooks/apache2/recipes/default.rb");

    let err = remote
        .update(&file, &Content::Raw(b"x".to_vec()), &WriteOptions::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "/cookbooks/apache2/recipes/default.rb cannot be updated."
    );
    let err = remote.delete(&file, false).unwrap_err();
    assert_eq!(
        err.to_string(),
        "/cookbooks/apache2/recipes/default.rb cannot be deleted."
    );
    let err = remote
        .create_child(
            &path("/cookbooks/apache2/recipes"),
            "other.rb",
            Some(&Content::Raw(b"x".to_vec())),
            &WriteOptions::default(),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "/cookbooks/apache2/recipes cannot have a child created under it."
    );
    assert!(remote.copies_as_unit(&path("/cookbooks/apache2")));
    assert!(!remote.copies_as_unit(&file));
}

#[test]
fn test_frozen_cookbook_needs_force() {
    let server = server();
    let remote = tree(&server, Layout::default());
    let freeze = WriteOptions {
        freeze: true,
        ..WriteOptions::default()
    };
    upload(&remote, "apache2", &bundle("apache2", "1.0.0", &[]), freeze);
    assert!(
        remote
            .read(&path("/cookbooks/apache2"))
            .unwrap()
            .as_cookbook()
            .unwrap()
            .frozen
    );

    let changed = Content::Cookbook(bundle("apache2", "1.0.0", &[("README.md", "hi")]));
    let err = remote
        .update(&path("/cookbooks/apache2"), &changed, &WriteOptions::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "/cookbooks/apache2 failed to write: Cookbook apache2 is frozen"
    );

    let force = WriteOptions {
        force: true,
        ..WriteOptions::default()
    };
    remote
        .update(&path("/cookbooks/apache2"), &changed, &force)
        .unwrap();
    assert_eq!(
        remote.list(&path("/cookbooks/apache2")).unwrap(),
        vec!["README.md", "metadata.rb", "recipes"]
    );
}

#[test]
fn test_cookbook_artifacts_are_immutable() {
    let server = server();
    let remote = tree(&server, hosted());
    let artifact = bundle("apache2", "1.0.0", &[]);
    remote
        .create_child(
            &path("/cookbook_artifacts"),
            "apache2-f00d",
            Some(&Content::Cookbook(artifact.clone())),
            &WriteOptions::default(),
        )
        .unwrap();

    assert_eq!(
        remote.list(&path("/cookbook_artifacts")).unwrap(),
        vec!["apache2-f00d"]
    );
    let err = remote
        .update(
            &path("/cookbook_artifacts/apache2-f00d"),
            &Content::Cookbook(artifact),
            &WriteOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err.refusal(), Some(Refusal::Immutable { .. })));
}

#[rstest]
#[case("recipes", true, true)]
#[case("test", true, false)]
#[case("README.md", false, true)]
fn test_cookbook_root_children(
    #[case] name: &str,
    #[case] is_container: bool,
    #[case] expected: bool,
) {
    let server = server();
    let remote = tree(&server, Layout::default());
    assert_eq!(
        remote.can_have_child(&path("/cookbooks/apache2"), name, is_container),
        expected
    );
}

#[test]
fn test_missing_paths_are_not_found() {
    let server = server();
    let remote = tree(&server, Layout::default());
    let err = remote.read(&path("/roles/ghost.json")).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(remote.list(&path("/cookbooks/ghost")).unwrap_err().is_not_found());
}
