use regex::Regex;
use std::collections::HashSet;

use crate::flow::{FlowGraph, Node, NodeKind};
use crate::validation::{Issue, IssueKind, Validator};

/// Checks each node on its own: entry point, menu keys, input specs and
/// conditional completeness.
pub struct StructureValidator;

impl StructureValidator {
    pub fn new() -> Self {
        StructureValidator
    }

    fn validate_start_node(&self, graph: &FlowGraph) -> Option<Issue> {
        if graph.start_node().is_some() {
            return None;
        }
        Some(Issue::new(
            IssueKind::MissingStartNode,
            Some(&graph.start_node_id),
            format!(
                "Start node '{}' does not exist in flow '{}'",
                graph.start_node_id, graph.id
            ),
        ))
    }

    /// Reports each duplicated key once per menu, in first-seen order
    fn validate_menu(&self, node: &Node, issues: &mut Vec<Issue>) {
        let NodeKind::Menu { options } = &node.kind else {
            return;
        };

        if options.is_empty() {
            issues.push(Issue::new(
                IssueKind::EmptyMenu,
                Some(&node.id),
                "Menu has no options; the session can only end by expiry",
            ));
            return;
        }

        let mut seen = HashSet::with_capacity(options.len());
        let mut reported = HashSet::new();
        for option in options {
            if !seen.insert(option.key.as_str()) && reported.insert(option.key.as_str()) {
                issues.push(Issue::new(
                    IssueKind::DuplicateOptionKey,
                    Some(&node.id),
                    format!("Option key '{}' is used more than once", option.key),
                ));
            }
        }
    }

    fn validate_input(&self, node: &Node, issues: &mut Vec<Issue>) {
        let NodeKind::Input { spec, .. } = &node.kind else {
            return;
        };

        if spec.variable_name.trim().is_empty() {
            issues.push(Issue::new(
                IssueKind::MissingVariableName,
                Some(&node.id),
                "Input node does not name the variable to store the input in",
            ));
        }

        if let Some(pattern) = &spec.pattern {
            if let Err(err) = Regex::new(pattern) {
                issues.push(Issue::new(
                    IssueKind::InvalidPattern,
                    Some(&node.id),
                    format!("Input pattern '{}' is not a valid regex: {}", pattern, err),
                ));
            }
        }
    }

    fn validate_conditional(&self, node: &Node, issues: &mut Vec<Issue>) {
        if let NodeKind::Conditional { branches, default } = &node.kind {
            if branches.is_empty() && default.is_none() {
                issues.push(Issue::new(
                    IssueKind::EmptyConditional,
                    Some(&node.id),
                    "Conditional has no branches and no default; it always terminates",
                ));
            }
        }
    }
}

impl Default for StructureValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for StructureValidator {
    fn validate(&self, graph: &FlowGraph) -> Vec<Issue> {
        let mut issues = Vec::new();

        issues.extend(self.validate_start_node(graph));

        for node in graph.nodes() {
            self.validate_menu(node, &mut issues);
            self.validate_input(node, &mut issues);
            self.validate_conditional(node, &mut issues);
        }

        issues
    }
}
