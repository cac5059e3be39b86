// src/dag/graph.rs

use std::collections::HashMap;

use crate::model::Node;

/// Immutable adjacency view over one plan's reduced node set.
///
/// This is deliberately lightweight: the scheduler keeps its own run state
/// (`visiting`, `done`, `inflight`, ...) separately in [`super::scheduler`];
/// `DagGraph` only answers "what does this node depend on" and "who depends
/// on it", which the plan builder and tests both find convenient.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, Node>,
    dependents: HashMap<String, Vec<String>>,
}

impl DagGraph {
    /// Build a graph from an already-reduced node set. Does not itself check
    /// for cycles or dangling references — that is the plan builder's job
    /// (`crate::plan::builder::build_plan`), since it needs a chosen root and
    /// produces the diagnostic messages spec.md §4.2 requires.
    pub fn new(nodes: HashMap<String, Node>) -> Self {
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for node in nodes.values() {
            for dep in &node.deps {
                dependents.entry(dep.clone()).or_default().push(node.id.clone());
            }
        }
        Self { nodes, dependents }
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn dependencies_of(&self, id: &str) -> &[String] {
        self.nodes.get(id).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn into_nodes(self) -> HashMap<String, Node> {
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DependsOrder;

    fn node(id: &str, deps: &[&str]) -> Node {
        Node {
            id: id.to_string(),
            deps: deps.iter().map(|s| s.to_string()).collect(),
            order: DependsOrder::Sequence,
        }
    }

    #[test]
    fn dependents_are_derived_from_deps() {
        let mut nodes = HashMap::new();
        nodes.insert("a".into(), node("a", &[]));
        nodes.insert("b".into(), node("b", &["a"]));
        nodes.insert("c".into(), node("c", &["a"]));
        let graph = DagGraph::new(nodes);

        let mut dependents = graph.dependents_of("a").to_vec();
        dependents.sort();
        assert_eq!(dependents, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(graph.dependencies_of("b"), &["a".to_string()]);
    }
}
