use crate::flow::FlowGraph;
use crate::validation::{Issue, IssueKind, Validator};

/// Validates that every edge points at a node of the same graph.
///
/// A null target is not an edge; it means "terminate".
pub struct ReferenceValidator;

impl ReferenceValidator {
    pub fn new() -> Self {
        ReferenceValidator
    }
}

impl Default for ReferenceValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for ReferenceValidator {
    fn validate(&self, graph: &FlowGraph) -> Vec<Issue> {
        let mut issues = Vec::new();

        for node in graph.nodes() {
            for edge in node.edges() {
                if !graph.contains(edge.target.as_str()) {
                    issues.push(Issue::new(
                        IssueKind::DanglingReference,
                        Some(&node.id),
                        format!(
                            "Node '{}' references non-existent node '{}' via {}",
                            node.id, edge.target, edge.via
                        ),
                    ));
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{ActionConfig, ActionNode, InputSpec, MenuOption, Node, NodeKind};

    #[test]
    fn test_valid_references() {
        let graph = FlowGraph::new("f", "start")
            .with_node(Node::menu(
                "start",
                vec![
                    MenuOption::new("1", "Name", Some("ask")),
                    MenuOption::new("0", "Exit", None),
                ],
            ))
            .with_node(Node::input("ask", InputSpec::new("name"), Some("bye")))
            .with_node(Node::end("bye"));

        assert!(ReferenceValidator::new().validate(&graph).is_empty());
    }

    #[test]
    fn test_dangling_references_on_every_edge_kind() {
        let graph = FlowGraph::new("f", "start")
            .with_node(Node::menu(
                "start",
                vec![MenuOption::new("1", "Pay", Some("pay"))],
            ))
            .with_node(Node::new(
                "pay",
                NodeKind::Payment(ActionNode {
                    action: ActionConfig {
                        name: "charge".into(),
                        params: serde_json::Value::Null,
                    },
                    success: Some("receipt".into()),
                    failure: Some("sorry".into()),
                }),
            ))
            .with_node(Node::input("ask", InputSpec::new("x"), Some("nowhere")));

        let issues = ReferenceValidator::new().validate(&graph);
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();

        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.kind == IssueKind::DanglingReference));
        assert!(messages[0].contains("'nowhere' via next"));
        assert!(messages[1].contains("'receipt' via success"));
        assert!(messages[2].contains("'sorry' via failure"));
    }
}
