//! `knife-sync deps`: walking run lists and cookbook metadata

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use repo_tree::cookbook::split_name_version;
use repo_tree::run_list::parse_run_list;
use repo_tree::{
    ChefPath, Collection, Content, Layout, Location, ObjectKind, ObjectTree, PathPattern,
    RunListItem,
};

use super::graph::DependencyGraph;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepsOptions {
    /// Print an indented tree per start path instead of a flat list
    pub tree: bool,
    /// Expand children below depth one (tree mode only)
    pub recurse: bool,
}

impl Default for DepsOptions {
    fn default() -> Self {
        Self {
            tree: false,
            recurse: true,
        }
    }
}

impl DepsOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.tree && !self.recurse {
            return Err(Error::Usage("--no-recurse requires --tree".to_string()));
        }
        Ok(())
    }
}

/// One output line: a path at an indentation depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepsLine {
    pub path: ChefPath,
    pub depth: usize,
}

impl fmt::Display for DepsLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", "  ".repeat(self.depth), self.path)
    }
}

#[derive(Debug, Default)]
pub struct DepsReport {
    pub lines: Vec<DepsLine>,
    /// Paths that were named or depended on but do not exist
    pub missing: Vec<ChefPath>,
    pub errors: Vec<repo_tree::Error>,
}

impl DepsReport {
    pub fn success(&self) -> bool {
        self.missing.is_empty() && self.errors.is_empty()
    }
}

/// Computes dependencies against one tree, caching each path's edges.
pub struct DepsResolver<'a> {
    tree: &'a dyn ObjectTree,
    layout: Layout,
    graph: DependencyGraph,
    report: DepsReport,
}

impl<'a> DepsResolver<'a> {
    pub fn new(tree: &'a dyn ObjectTree, layout: Layout) -> Self {
        Self {
            tree,
            layout,
            graph: DependencyGraph::new(),
            report: DepsReport::default(),
        }
    }

    /// Print the dependencies of every path the patterns expand to.
    ///
    /// # Errors
    ///
    /// Returns `Error::Usage` for `recurse` without `tree`.
    pub fn run(mut self, patterns: &[PathPattern], options: &DepsOptions) -> Result<DepsReport> {
        options.validate()?;

        let mut starts = Vec::new();
        for pattern in patterns {
            match pattern.expand(&[self.tree]) {
                Ok(paths) => starts.extend(paths),
                Err(e) => self.report.errors.push(e),
            }
        }

        if options.tree {
            for start in starts {
                self.print_tree(start, options.recurse);
            }
        } else {
            let mut visited = HashSet::new();
            for start in starts {
                self.print_flat(start, &mut visited);
            }
        }
        Ok(self.report)
    }

    /// Post-order: every dependency before its dependent, each path once.
    fn print_flat(&mut self, start: ChefPath, visited: &mut HashSet<ChefPath>) {
        let mut stack = vec![(start, false)];
        while let Some((path, expanded)) = stack.pop() {
            if expanded {
                self.report.lines.push(DepsLine { path, depth: 0 });
                continue;
            }
            if !visited.insert(path.clone()) {
                continue;
            }
            let deps = self.dependencies(&path);
            stack.push((path, true));
            stack.extend(
                deps.into_iter()
                    .rev()
                    .filter(|dep| !visited.contains(dep))
                    .map(|dep| (dep, false)),
            );
        }
    }

    /// Pre-order with indentation. A path already expanded in this tree is
    /// printed again but not expanded.
    fn print_tree(&mut self, start: ChefPath, recurse: bool) {
        let mut printed = HashSet::new();
        let mut stack = vec![(start, 0)];
        while let Some((path, depth)) = stack.pop() {
            let deps = self.dependencies(&path);
            self.report.lines.push(DepsLine {
                path: path.clone(),
                depth,
            });
            if (recurse || depth == 0) && printed.insert(path) {
                stack.extend(deps.into_iter().rev().map(|dep| (dep, depth + 1)));
            }
        }
    }

    /// Direct dependencies of `path`, computed once per invocation.
    fn dependencies(&mut self, path: &ChefPath) -> Vec<ChefPath> {
        if !self.graph.contains(path) {
            self.graph.add_node(path.clone());
            match self.compute(path) {
                Ok(deps) => {
                    for dep in deps {
                        self.graph.add_edge(path, dep);
                    }
                }
                Err(e) if e.is_not_found() => self.report.missing.push(path.clone()),
                Err(e) => self.report.errors.push(e),
            }
        }
        self.graph.dependencies_of(path).to_vec()
    }

    fn compute(&self, path: &ChefPath) -> repo_tree::Result<Vec<ChefPath>> {
        if !self.tree.exists(path)? {
            return Err(repo_tree::Error::not_found(path));
        }
        tracing::debug!(path = %path, "computing dependencies");

        let deps = match self.layout.locate(path) {
            Location::Object {
                kind: ObjectKind::Node,
                ..
            } => {
                let node = self.read_json(path)?;
                let mut deps = Vec::new();
                if let Some(env) = node.get("chef_environment").and_then(Value::as_str)
                    && env != "_default"
                {
                    deps.push(ChefPath::new(format!("/environments/{}.json", env)));
                }
                deps.extend(self.run_list_deps(parse_run_list(node.get("run_list")))?);
                deps
            }
            Location::Object {
                kind: ObjectKind::Role,
                ..
            } => {
                let role = self.read_json(path)?;
                let mut items = parse_run_list(role.get("run_list"));
                if let Some(env_run_lists) = role.get("env_run_lists").and_then(Value::as_object)
                {
                    for run_list in env_run_lists.values() {
                        items.extend(parse_run_list(Some(run_list)));
                    }
                }
                self.run_list_deps(items)?
            }
            Location::Cookbook { .. } => match self.tree.read(path)? {
                Content::Cookbook(bundle) => {
                    let mut deps = Vec::new();
                    for name in bundle.metadata().depends {
                        deps.push(self.cookbook_path(&name)?);
                    }
                    deps
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(deps)
    }

    fn read_json(&self, path: &ChefPath) -> repo_tree::Result<Value> {
        match self.tree.read(path)? {
            Content::Json(value) => Ok(value),
            Content::Unparsed { error, .. } => {
                tracing::warn!(
                    "Parse error reading {} as JSON: {}",
                    self.tree.display_path(path),
                    error
                );
                Ok(Value::Null)
            }
            _ => Ok(Value::Null),
        }
    }

    fn run_list_deps(&self, items: Vec<RunListItem>) -> repo_tree::Result<Vec<ChefPath>> {
        let mut deps: Vec<ChefPath> = Vec::new();
        for item in items {
            let dep = match &item {
                RunListItem::Role(name) => ChefPath::new(format!("/roles/{}.json", name)),
                RunListItem::Recipe { cookbook, .. } => self.cookbook_path(cookbook)?,
            };
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        Ok(deps)
    }

    /// Path of the cookbook named `name`. In a versioned layout this is the
    /// highest `name-version` directory, or the bare name if none exists.
    fn cookbook_path(&self, name: &str) -> repo_tree::Result<ChefPath> {
        let parent = ChefPath::root().join(Collection::Cookbooks.name());
        let bare = parent.join(name);
        if !self.layout.versioned_cookbooks || !self.tree.exists(&parent)? {
            return Ok(bare);
        }
        let latest = self
            .tree
            .list(&parent)?
            .into_iter()
            .filter_map(|dir| {
                let (dir_cookbook, version) = split_name_version(&dir)?;
                (dir_cookbook == name).then(|| (version, dir.clone()))
            })
            .max_by(|a, b| a.0.cmp(&b.0));
        Ok(latest.map_or(bare, |(_, dir)| parent.join(&dir)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_recurse_needs_tree() {
        let options = DepsOptions {
            tree: false,
            recurse: false,
        };
        assert_eq!(
            options.validate().unwrap_err().to_string(),
            "--no-recurse requires --tree"
        );
    }

    #[test]
    fn test_line_indentation() {
        let line = DepsLine {
            path: ChefPath::new("/cookbooks/apt"),
            depth: 2,
        };
        assert_eq!(line.to_string(), "    /cookbooks/apt");
    }
}
