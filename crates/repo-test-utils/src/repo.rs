//! [`TestRepo`] builder for local repository scenarios.

use std::fs;
use std::path::Path;

use repo_fs::LocalTree;
use repo_tree::Layout;
use serde_json::Value;
use tempfile::TempDir;

/// A temporary chef repository with helpers for setup and assertion.
///
/// # Example
///
/// ```rust,no_run
/// use repo_test_utils::TestRepo;
///
/// let repo = TestRepo::new();
/// repo.role("web", &["recipe[nginx]"]);
/// repo.cookbook("nginx", "1.0.0", &[]);
/// repo.assert_file_exists("roles/web.json");
/// ```
pub struct TestRepo {
    temp_dir: TempDir,
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRepo {
    /// Create an empty repository with the four static collections.
    pub fn new() -> Self {
        let repo = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        for dir in ["cookbooks", "data_bags", "environments", "roles"] {
            fs::create_dir_all(repo.root().join(dir)).unwrap();
        }
        repo
    }

    /// Return the root path of the repository.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The repository as an object tree.
    pub fn tree(&self, layout: Layout) -> LocalTree {
        LocalTree::new(self.root(), layout)
    }

    /// Write `content` to `path` (relative to the root), creating parents.
    pub fn write(&self, path: &str, content: &str) {
        let full_path = self.root().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full_path, content).unwrap();
    }

    pub fn write_json(&self, path: &str, value: &Value) {
        self.write(path, &serde_json::to_string_pretty(value).unwrap());
    }

    pub fn mkdir(&self, path: &str) {
        fs::create_dir_all(self.root().join(path)).unwrap();
    }

    /// `roles/<name>.json` with the given run list.
    pub fn role(&self, name: &str, run_list: &[&str]) {
        self.write_json(
            &format!("roles/{}.json", name),
            &serde_json::json!({ "name": name, "run_list": run_list }),
        );
    }

    pub fn environment(&self, name: &str) {
        self.write_json(
            &format!("environments/{}.json", name),
            &serde_json::json!({ "name": name }),
        );
    }

    /// `nodes/<name>.json` in `environment` with the given run list.
    pub fn node(&self, name: &str, environment: &str, run_list: &[&str]) {
        self.write_json(
            &format!("nodes/{}.json", name),
            &serde_json::json!({
                "name": name,
                "chef_environment": environment,
                "run_list": run_list,
            }),
        );
    }

    /// `cookbooks/<name>` with a metadata.rb and a default recipe.
    pub fn cookbook(&self, name: &str, version: &str, depends: &[&str]) {
        self.cookbook_in(&format!("cookbooks/{}", name), name, version, depends);
    }

    /// A cookbook in an arbitrary directory, such as `cookbooks/x-1.0.0`.
    pub fn cookbook_in(&self, dir: &str, name: &str, version: &str, depends: &[&str]) {
        let mut metadata = format!("name '{}'\nversion '{}'\n", name, version);
        for dep in depends {
            metadata.push_str(&format!("depends '{}'\n", dep));
        }
        self.write(&format!("{}/metadata.rb", dir), &metadata);
        self.write(
            &format!("{}/recipes/default.rb", dir),
            &format!("log '{}'\n", name),
        );
    }

    pub fn read(&self, path: &str) -> String {
        let full_path = self.root().join(path);
        fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()))
    }

    pub fn read_json(&self, path: &str) -> Value {
        serde_json::from_str(&self.read(path)).unwrap()
    }

    /// Assert that `path` (relative to the repo root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `path` (relative to the repo root) does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_file_not_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the file at `path` (relative to root) contains `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, path: &str, content: &str) {
        let file_content = self.read(path);
        assert!(
            file_content.contains(content),
            "File {} does not contain expected content.\nExpected: {}\nActual: {}",
            path,
            content,
            file_content
        );
    }
}
