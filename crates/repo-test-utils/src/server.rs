//! [`TestServer`]: an in-memory server with helpers for seeding objects.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use repo_remote::{MemoryServer, RestApi, ServerTree};
use repo_tree::{ChefPath, Content, CookbookBundle, Layout, ObjectTree, WriteOptions};
use serde_json::Value;

/// A [`MemoryServer`] plus the seeding shortcuts tests keep reaching for.
pub struct TestServer {
    server: Arc<MemoryServer>,
}

impl Default for TestServer {
    fn default() -> Self {
        Self::new()
    }
}

impl TestServer {
    /// A fresh server holding only the `_default` environment.
    pub fn new() -> Self {
        Self {
            server: Arc::new(MemoryServer::new()),
        }
    }

    /// A server persisted to `path`, as the CLI opens `file://` URLs.
    pub fn persisted(path: &Path) -> Self {
        Self {
            server: Arc::new(MemoryServer::open(path).unwrap()),
        }
    }

    pub fn api(&self) -> Arc<MemoryServer> {
        self.server.clone()
    }

    /// The server as an object tree.
    pub fn tree(&self, layout: Layout) -> ServerTree {
        ServerTree::new(self.server.clone(), layout)
    }

    /// POST a document to a REST collection such as `/roles`.
    pub fn post(&self, collection: &str, body: Value) {
        self.server.post(collection, &body).unwrap();
    }

    pub fn get(&self, endpoint: &str) -> Value {
        self.server.get(endpoint).unwrap()
    }

    pub fn exists(&self, endpoint: &str) -> bool {
        self.server.get(endpoint).is_ok()
    }

    pub fn role(&self, name: &str, run_list: &[&str]) {
        self.post("/roles", serde_json::json!({ "name": name, "run_list": run_list }));
    }

    pub fn environment(&self, name: &str) {
        self.post("/environments", serde_json::json!({ "name": name }));
    }

    /// Upload one cookbook version with a metadata.rb and a default recipe.
    ///
    /// Any number of versions of the same cookbook can be uploaded.
    pub fn cookbook(&self, name: &str, version: &str, depends: &[&str]) {
        let mut metadata = format!("name '{}'\nversion '{}'\n", name, version);
        for dep in depends {
            metadata.push_str(&format!("depends '{}'\n", dep));
        }
        let mut files = BTreeMap::new();
        files.insert("metadata.rb".to_string(), metadata.into_bytes());
        files.insert(
            "recipes/default.rb".to_string(),
            format!("log '{}'\n", name).into_bytes(),
        );
        self.cookbook_files(name, files);
    }

    /// Upload a cookbook version with exactly `files`.
    pub fn cookbook_files(&self, name: &str, files: BTreeMap<String, Vec<u8>>) {
        let bundle = CookbookBundle::from_files(name, files);
        let versioned = ServerTree::new(
            self.server.clone(),
            Layout {
                versioned_cookbooks: true,
                ..Layout::default()
            },
        );
        versioned
            .create_child(
                &ChefPath::new("/cookbooks"),
                &bundle.versioned_name(),
                Some(&Content::Cookbook(bundle.clone())),
                &WriteOptions::default(),
            )
            .unwrap();
    }
}
