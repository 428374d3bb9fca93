//! # USSD Flow DSL
//!
//! Flow definitions describe a USSD application as a directed graph of
//! menu, input, conditional, payment, api and end nodes. This crate provides
//! the immutable graph model, parsing of the editor's JSON documents (and an
//! equivalent YAML form), and the static validator that certifies a graph
//! before it may serve live sessions.
//!
//! ## Example
//!
//! ```
//! use ussd_dsl::parse_and_validate_flow_definition;
//!
//! let json = r#"{
//!   "id": "balance",
//!   "startNodeId": "start",
//!   "nodes": {
//!     "start": {
//!       "kind": "menu",
//!       "text": "Welcome",
//!       "options": [
//!         {"key": "1", "text": "Check balance", "targetNodeId": "bal"},
//!         {"key": "0", "text": "Exit", "targetNodeId": null}
//!       ]
//!     },
//!     "bal": {"kind": "end", "text": "Your balance is 100"}
//!   }
//! }"#;
//!
//! let (graph, warnings) = parse_and_validate_flow_definition(json).unwrap();
//! assert_eq!(graph.node_count(), 2);
//! assert!(warnings.is_empty());
//! ```

mod error;
mod parser;

pub mod flow;
pub mod validation;

pub use error::DslError;
pub use flow::{
    ActionConfig, ActionNode, Condition, ConditionOperator, ConditionalBranch, Edge, EdgeVia,
    FlowGraph, FlowId, InputSpec, MenuOption, Node, NodeId, NodeKind,
};
pub use validation::{validate, Issue, IssueKind, Severity, ValidationResult, Validator};

/// Parse a JSON flow definition whose document carries its own `id`.
///
/// Only the document shape is checked here; run [`validate`] before
/// publishing the result.
pub fn parse_flow_definition(json: &str) -> Result<FlowGraph, DslError> {
    parser::parse_json(json, None)
}

/// Parse a JSON flow definition, using `flow_id` when the document has no `id`
pub fn parse_flow_definition_with_id(flow_id: &str, json: &str) -> Result<FlowGraph, DslError> {
    parser::parse_json(json, Some(flow_id))
}

/// Parse a YAML flow definition. Same document shape as the JSON form.
pub fn parse_flow_definition_yaml(yaml: &str) -> Result<FlowGraph, DslError> {
    parser::parse_yaml(yaml, None)
}

/// Parse a YAML flow definition, using `flow_id` when the document has no `id`
pub fn parse_flow_definition_yaml_with_id(flow_id: &str, yaml: &str) -> Result<FlowGraph, DslError> {
    parser::parse_yaml(yaml, Some(flow_id))
}

/// Parse and validate a JSON flow definition.
///
/// # Returns
///
/// The graph together with any warning-severity issues.
///
/// # Errors
///
/// * Invalid JSON syntax or an unusable node
/// * Any error-severity validation issue, as [`DslError::Validation`]
///
/// ```
/// use ussd_dsl::{parse_and_validate_flow_definition, IssueKind};
///
/// let json = r#"{
///   "id": "broken",
///   "startNodeId": "start",
///   "nodes": {
///     "start": {"kind": "input", "inputSpec": {"variableName": "pin"}, "nextNodeId": "gone"}
///   }
/// }"#;
///
/// let err = parse_and_validate_flow_definition(json).unwrap_err();
/// assert_eq!(err.error_code(), "ERR_DSL_VALIDATION");
/// assert_eq!(err.issues()[0].kind, IssueKind::DanglingReference);
/// ```
pub fn parse_and_validate_flow_definition(
    json: &str,
) -> Result<(FlowGraph, Vec<Issue>), DslError> {
    let graph = parse_flow_definition(json)?;
    let result = validate(&graph);

    if !result.is_valid() {
        return Err(DslError::Validation(result.errors));
    }

    Ok((graph, result.warnings))
}

/// Returns a version string for the crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
