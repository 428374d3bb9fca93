use crate::flow::{FlowGraph, NodeId, NodeKind};
use crate::validation::graph::{find_cycles, reachable_from, Adjacency};
use crate::validation::{Issue, IssueKind, Validator};

/// Whole-graph checks: reachability, cycles and terminal reachability.
///
/// Reachability and terminal checks need a start node and are skipped when
/// it is missing; that case is reported by the structure validator.
pub struct TraversalValidator;

impl TraversalValidator {
    pub fn new() -> Self {
        TraversalValidator
    }

    fn validate_reachability(&self, graph: &FlowGraph, adjacency: &Adjacency<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let reached = reachable_from(adjacency, graph.start_node_id.as_str());

        for node in graph.nodes() {
            if !reached.contains(node.id.as_str()) {
                issues.push(Issue::new(
                    IssueKind::UnreachableNode,
                    Some(&node.id),
                    format!(
                        "Node '{}' cannot be reached from start node '{}'",
                        node.id, graph.start_node_id
                    ),
                ));
            }
        }

        let terminal_reachable = reached.iter().any(|id| {
            graph
                .node(id)
                .map(|n| matches!(n.kind, NodeKind::End))
                .unwrap_or(false)
        });
        if !terminal_reachable {
            issues.push(Issue::new(
                IssueKind::NoTerminalPath,
                None,
                "No end node is reachable from the start node; sessions can only end by expiry or explicit exit",
            ));
        }

        issues
    }

    fn validate_cycles(&self, graph: &FlowGraph, adjacency: &Adjacency<'_>) -> Vec<Issue> {
        let start = graph.start_node_id.as_str();
        let roots = std::iter::once(start).chain(adjacency.node_ids());

        find_cycles(adjacency, roots)
            .into_iter()
            .map(|cycle| {
                let closing = NodeId::from(cycle.closing_node());
                Issue::new(
                    IssueKind::CircularReference,
                    Some(&closing),
                    format!("Circular reference detected: {}", cycle.describe()),
                )
            })
            .collect()
    }
}

impl Default for TraversalValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for TraversalValidator {
    fn validate(&self, graph: &FlowGraph) -> Vec<Issue> {
        let adjacency = Adjacency::from_graph(graph);
        let mut issues = Vec::new();

        if graph.start_node().is_some() {
            issues.extend(self.validate_reachability(graph, &adjacency));
        }
        issues.extend(self.validate_cycles(graph, &adjacency));

        issues
    }
}
