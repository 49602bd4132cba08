//! Dependency edges between namespace paths
//!
//! Edges point from dependent to dependency: if the node `/nodes/web.json`
//! runs `role[base]`, the edge is `/nodes/web.json -> /roles/base.json`.
//! The graph doubles as the per-invocation cache: a path is a node once
//! its dependencies have been computed, even if it has none.

use std::collections::HashMap;

use repo_tree::ChefPath;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Adjacency list in declaration order: key depends on each value.
    edges: HashMap<ChefPath, Vec<ChefPath>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `path` has been resolved.
    pub fn add_node(&mut self, path: ChefPath) {
        self.edges.entry(path).or_default();
    }

    /// Declare that `from` depends on `to`. Repeated edges are ignored.
    pub fn add_edge(&mut self, from: &ChefPath, to: ChefPath) {
        let deps = self.edges.entry(from.clone()).or_default();
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    pub fn contains(&self, path: &ChefPath) -> bool {
        self.edges.contains_key(path)
    }

    /// Direct dependencies of a node, in declaration order.
    pub fn dependencies_of(&self, path: &ChefPath) -> &[ChefPath] {
        self.edges.get(path).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        assert!(!graph.contains(&ChefPath::new("/roles/x.json")));
        assert!(graph.dependencies_of(&ChefPath::new("/roles/x.json")).is_empty());
    }

    #[test]
    fn test_edges_keep_order_and_skip_repeats() {
        let mut graph = DependencyGraph::new();
        let role = ChefPath::new("/roles/web.json");
        graph.add_edge(&role, ChefPath::new("/cookbooks/nginx"));
        graph.add_edge(&role, ChefPath::new("/cookbooks/apt"));
        graph.add_edge(&role, ChefPath::new("/cookbooks/nginx"));

        assert_eq!(
            graph.dependencies_of(&role),
            &[ChefPath::new("/cookbooks/nginx"), ChefPath::new("/cookbooks/apt")]
        );
        assert!(graph.contains(&role));
    }

    #[test]
    fn test_node_without_edges_is_cached() {
        let mut graph = DependencyGraph::new();
        let env = ChefPath::new("/environments/prod.json");
        assert!(!graph.contains(&env));
        graph.add_node(env.clone());
        assert!(graph.contains(&env));
        assert!(graph.dependencies_of(&env).is_empty());
    }
}
