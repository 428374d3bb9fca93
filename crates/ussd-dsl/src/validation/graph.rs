//! Graph algorithms shared by the validators.
//!
//! Reachability and cycle detection are separate traversals over the same
//! [`Adjacency`] view; neither mutates the flow graph.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::flow::FlowGraph;

/// Outgoing edges per node, restricted to targets that exist in the graph.
///
/// Every node of the graph has an entry, even when it has no edges.
pub struct Adjacency<'a> {
    edges: BTreeMap<&'a str, Vec<&'a str>>,
}

impl<'a> Adjacency<'a> {
    pub fn from_graph(graph: &'a FlowGraph) -> Self {
        let mut edges = BTreeMap::new();
        for node in graph.nodes() {
            let targets = node
                .edges()
                .into_iter()
                .map(|edge| edge.target.as_str())
                .filter(|target| graph.contains(target))
                .collect();
            edges.insert(node.id.as_str(), targets);
        }
        Self { edges }
    }

    /// Successors of a node; empty for unknown ids
    pub fn successors(&self, node: &str) -> &[&'a str] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All node ids in ascending order
    pub fn node_ids(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.edges.keys().copied()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.edges.contains_key(node)
    }
}

/// Breadth-first traversal from `start`. Returns every visited node id.
pub fn reachable_from<'a>(adjacency: &Adjacency<'a>, start: &'a str) -> BTreeSet<&'a str> {
    let mut visited = BTreeSet::new();
    if !adjacency.contains(start) {
        return visited;
    }

    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        for &next in adjacency.successors(node) {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    visited
}

/// A directed cycle found by [`find_cycles`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Nodes on the cycle, starting at the node where it closes
    pub path: Vec<String>,
}

impl Cycle {
    /// Node revisited while still on the recursion stack
    pub fn closing_node(&self) -> &str {
        &self.path[0]
    }

    /// Render as `a → b → a`
    pub fn describe(&self) -> String {
        let mut formatted = self.path.join(" → ");
        formatted.push_str(" → ");
        formatted.push_str(&self.path[0]);
        formatted
    }
}

/// Depth-first cycle detection with a recursion stack.
///
/// Roots are visited in the order given, so passing the start node first
/// makes the reported cycles follow the path a session would take.
pub fn find_cycles<'a>(
    adjacency: &Adjacency<'a>,
    roots: impl IntoIterator<Item = &'a str>,
) -> Vec<Cycle> {
    let mut visited = HashSet::new();
    let mut path_set = HashSet::new();
    let mut current_path = Vec::new();
    let mut cycles = Vec::new();

    for root in roots {
        if adjacency.contains(root) && !visited.contains(root) {
            visit(
                root,
                adjacency,
                &mut visited,
                &mut path_set,
                &mut current_path,
                &mut cycles,
            );
        }
    }

    cycles
}

fn visit<'a>(
    node: &'a str,
    adjacency: &Adjacency<'a>,
    visited: &mut HashSet<&'a str>,
    path_set: &mut HashSet<&'a str>,
    current_path: &mut Vec<&'a str>,
    cycles: &mut Vec<Cycle>,
) {
    if visited.contains(node) {
        return;
    }

    if path_set.contains(node) {
        if let Some(cycle_start) = current_path.iter().position(|&n| n == node) {
            cycles.push(Cycle {
                path: current_path[cycle_start..]
                    .iter()
                    .map(|&s| s.to_string())
                    .collect(),
            });
        }
        return;
    }

    path_set.insert(node);
    current_path.push(node);

    for &next in adjacency.successors(node) {
        visit(next, adjacency, visited, path_set, current_path, cycles);
    }

    path_set.remove(node);
    current_path.pop();
    visited.insert(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{MenuOption, Node};

    fn menu(id: &str, targets: &[&str]) -> Node {
        let options = targets
            .iter()
            .enumerate()
            .map(|(i, t)| MenuOption::new(&(i + 1).to_string(), t, Some(t)))
            .collect();
        Node::menu(id, options)
    }

    #[test]
    fn test_adjacency_drops_missing_targets() {
        let graph = FlowGraph::new("f", "a")
            .with_node(menu("a", &["b", "ghost"]))
            .with_node(Node::end("b"));

        let adjacency = Adjacency::from_graph(&graph);
        assert_eq!(adjacency.successors("a"), &["b"]);
        assert!(adjacency.successors("b").is_empty());
        assert!(adjacency.successors("ghost").is_empty());
    }

    #[test]
    fn test_reachable_from_start() {
        let graph = FlowGraph::new("f", "a")
            .with_node(menu("a", &["b"]))
            .with_node(menu("b", &["c"]))
            .with_node(Node::end("c"))
            .with_node(Node::end("island"));

        let adjacency = Adjacency::from_graph(&graph);
        let reached = reachable_from(&adjacency, "a");
        assert_eq!(reached.into_iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reachable_from_missing_start_is_empty() {
        let graph = FlowGraph::new("f", "nope").with_node(Node::end("a"));
        let adjacency = Adjacency::from_graph(&graph);
        assert!(reachable_from(&adjacency, "nope").is_empty());
    }

    #[test]
    fn test_find_cycles() {
        let acyclic = FlowGraph::new("f", "a")
            .with_node(menu("a", &["b", "c"]))
            .with_node(menu("b", &["c"]))
            .with_node(Node::end("c"));
        let adjacency = Adjacency::from_graph(&acyclic);
        assert!(find_cycles(&adjacency, adjacency.node_ids()).is_empty());

        let cyclic = FlowGraph::new("f", "a")
            .with_node(menu("a", &["b"]))
            .with_node(menu("b", &["c"]))
            .with_node(menu("c", &["a"]));
        let adjacency = Adjacency::from_graph(&cyclic);
        let cycles = find_cycles(&adjacency, ["a"]);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].closing_node(), "a");
        assert_eq!(cycles[0].describe(), "a → b → c → a");
    }

    #[test]
    fn test_find_self_loop() {
        let graph = FlowGraph::new("f", "a").with_node(menu("a", &["a"]));
        let adjacency = Adjacency::from_graph(&graph);
        let cycles = find_cycles(&adjacency, adjacency.node_ids());
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path, vec!["a".to_string()]);
    }
}
