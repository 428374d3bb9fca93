use serde::Serialize;
use std::error::Error;
use std::fmt;

use crate::flow::{FlowGraph, NodeId};

mod flow_validator;
pub mod graph;
mod reference;
mod traversal;

pub use flow_validator::StructureValidator;
pub use reference::ReferenceValidator;
pub use traversal::TraversalValidator;

/// How serious an issue is. Graphs with any `Error` must not be published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// The kind of problem a validator found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingStartNode,
    UnreachableNode,
    DanglingReference,
    DuplicateOptionKey,
    CircularReference,
    NoTerminalPath,
    EmptyMenu,
    InvalidPattern,
    MissingVariableName,
    EmptyConditional,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MissingStartNode => "missing_start_node",
            IssueKind::UnreachableNode => "unreachable_node",
            IssueKind::DanglingReference => "dangling_reference",
            IssueKind::DuplicateOptionKey => "duplicate_option_key",
            IssueKind::CircularReference => "circular_reference",
            IssueKind::NoTerminalPath => "no_terminal_path",
            IssueKind::EmptyMenu => "empty_menu",
            IssueKind::InvalidPattern => "invalid_pattern",
            IssueKind::MissingVariableName => "missing_variable_name",
            IssueKind::EmptyConditional => "empty_conditional",
        }
    }

    /// Fixed severity of each kind
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::UnreachableNode
            | IssueKind::NoTerminalPath
            | IssueKind::EmptyMenu
            | IssueKind::EmptyConditional => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding of the flow validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub kind: IssueKind,

    /// Node the issue is about, if it concerns one node
    pub node_id: Option<NodeId>,

    /// Human-readable explanation
    pub message: String,

    pub severity: Severity,
}

impl Issue {
    pub fn new(kind: IssueKind, node_id: Option<&NodeId>, message: impl Into<String>) -> Self {
        Self {
            kind,
            node_id: node_id.cloned(),
            message: message.into(),
            severity: kind.severity(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(node_id) = &self.node_id {
            write!(f, "{}: {} (at node '{}')", self.kind, self.message, node_id)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl Error for Issue {}

/// Outcome of validating a flow graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationResult {
    /// True when no error-severity issue was found
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether any issue of this kind was reported
    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues().any(|issue| issue.kind == kind)
    }

    /// Issues of one kind, errors first
    pub fn of_kind(&self, kind: IssueKind) -> Vec<&Issue> {
        self.issues().filter(|issue| issue.kind == kind).collect()
    }

    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// A check over one aspect of a flow graph
pub trait Validator {
    /// Inspect the graph and return every issue found
    fn validate(&self, graph: &FlowGraph) -> Vec<Issue>;
}

/// Run every validator over the graph and split issues by severity.
///
/// Pure and deterministic: validating the same graph twice gives equal results.
pub fn validate(graph: &FlowGraph) -> ValidationResult {
    let validators: Vec<Box<dyn Validator>> = vec![
        Box::new(StructureValidator::new()),
        Box::new(ReferenceValidator::new()),
        Box::new(TraversalValidator::new()),
    ];

    let mut result = ValidationResult::default();
    for validator in validators {
        for issue in validator.validate(graph) {
            match issue.severity {
                Severity::Error => result.errors.push(issue),
                Severity::Warning => result.warnings.push(issue),
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{MenuOption, Node};

    #[test]
    fn test_issue_display_names_node() {
        let node = NodeId::from("menu1");
        let issue = Issue::new(IssueKind::EmptyMenu, Some(&node), "Menu has no options");
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(
            issue.to_string(),
            "empty_menu: Menu has no options (at node 'menu1')"
        );
    }

    #[test]
    fn test_validate_splits_by_severity() {
        let graph = FlowGraph::new("f", "start")
            .with_node(Node::menu(
                "start",
                vec![
                    MenuOption::new("1", "Go", Some("ghost")),
                    MenuOption::new("2", "Done", Some("done")),
                ],
            ))
            .with_node(Node::end("done"))
            .with_node(Node::end("orphan"));

        let result = validate(&graph);
        assert!(!result.is_valid());
        assert!(result.errors.iter().all(Issue::is_error));
        assert!(result.has(IssueKind::DanglingReference));
        assert!(result.has(IssueKind::UnreachableNode));
        assert!(result.warnings.iter().all(|w| !w.is_error()));
    }

    #[test]
    fn test_result_serializes_with_wire_names() {
        let node = NodeId::from("x");
        let result = ValidationResult {
            errors: vec![Issue::new(IssueKind::DanglingReference, Some(&node), "m")],
            warnings: vec![],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["errors"][0]["kind"], "dangling_reference");
        assert_eq!(json["errors"][0]["nodeId"], "x");
        assert_eq!(json["errors"][0]["severity"], "error");
    }
}
