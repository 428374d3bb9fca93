use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::DslError;
use crate::flow::{
    ActionConfig, ActionNode, Condition, ConditionOperator, ConditionalBranch, FlowGraph,
    InputSpec, MenuOption, Node, NodeId, NodeKind,
};

/// Flow definition document as produced by the flow editor
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    start_node_id: String,
    #[serde(default)]
    nodes: BTreeMap<String, RawNode>,
}

/// A node as it appears on the wire: every kind's fields, all optional
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    options: Vec<MenuOption>,
    #[serde(default)]
    input_spec: Option<InputSpec>,
    #[serde(default)]
    condition: Option<RawCondition>,
    #[serde(default)]
    branches: Vec<RawBranch>,
    #[serde(default)]
    next_node_id: Option<String>,
    #[serde(default)]
    success_node_id: Option<String>,
    #[serde(default)]
    failure_node_id: Option<String>,
    #[serde(default)]
    default_node_id: Option<String>,
    #[serde(default)]
    action: Option<RawAction>,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    variable: String,
    operator: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBranch {
    condition: RawCondition,
    #[serde(default)]
    target_node_id: Option<String>,
}

/// `"action": "mpesa_charge"` or `"action": {"name": ..., "params": {...}}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAction {
    Name(String),
    Config(ActionConfig),
}

/// Parse a JSON flow definition.
///
/// The flow id comes from the document's `id` field, or `fallback_id` when
/// the document has none.
pub fn parse_json(json: &str, fallback_id: Option<&str>) -> Result<FlowGraph, DslError> {
    let document: FlowDocument = serde_json::from_str(json)?;
    build_graph(document, fallback_id)
}

/// Parse a YAML flow definition with the same shape as the JSON one
pub fn parse_yaml(yaml: &str, fallback_id: Option<&str>) -> Result<FlowGraph, DslError> {
    let document: FlowDocument = serde_yaml::from_str(yaml)?;
    build_graph(document, fallback_id)
}

fn build_graph(document: FlowDocument, fallback_id: Option<&str>) -> Result<FlowGraph, DslError> {
    let flow_id = match (document.id, fallback_id) {
        (Some(id), _) if !id.is_empty() => id,
        (_, Some(id)) => id.to_string(),
        _ => return Err(DslError::MissingRequiredField("id".to_string())),
    };

    let mut graph = FlowGraph::new(flow_id, document.start_node_id);
    if let Some(name) = document.name {
        graph = graph.with_name(name);
    }

    for (id, raw) in document.nodes {
        graph = graph.with_node(convert_node(id, raw)?);
    }

    Ok(graph)
}

fn convert_node(id: String, raw: RawNode) -> Result<Node, DslError> {
    let kind = match raw.kind.as_str() {
        "menu" => NodeKind::Menu {
            options: raw.options,
        },
        "input" => NodeKind::Input {
            spec: raw.input_spec.ok_or_else(|| DslError::MissingNodeField {
                node_id: id.clone(),
                field: "inputSpec",
            })?,
            next: raw.next_node_id.map(NodeId),
        },
        "conditional" => {
            let mut branches = Vec::with_capacity(raw.branches.len() + 1);
            if let Some(condition) = raw.condition {
                branches.push(ConditionalBranch {
                    condition: convert_condition(&id, condition)?,
                    target: raw.success_node_id.map(NodeId),
                });
            }
            for branch in raw.branches {
                branches.push(ConditionalBranch {
                    condition: convert_condition(&id, branch.condition)?,
                    target: branch.target_node_id.map(NodeId),
                });
            }
            if branches.is_empty() {
                return Err(DslError::MissingNodeField {
                    node_id: id,
                    field: "condition",
                });
            }
            NodeKind::Conditional {
                branches,
                default: raw.default_node_id.or(raw.failure_node_id).map(NodeId),
            }
        }
        "payment" | "api" => {
            let action = match raw.action {
                Some(RawAction::Config(config)) => config,
                Some(RawAction::Name(name)) => ActionConfig {
                    name,
                    params: serde_json::Value::Null,
                },
                None => ActionConfig {
                    name: raw.kind.clone(),
                    params: serde_json::Value::Null,
                },
            };
            let action_node = ActionNode {
                action,
                success: raw.success_node_id.or(raw.next_node_id).map(NodeId),
                failure: raw.failure_node_id.map(NodeId),
            };
            if raw.kind == "payment" {
                NodeKind::Payment(action_node)
            } else {
                NodeKind::Api(action_node)
            }
        }
        "end" => NodeKind::End,
        other => {
            return Err(DslError::UnknownNodeKind {
                node_id: id,
                kind: other.to_string(),
            })
        }
    };

    Ok(Node {
        id: NodeId(id),
        text: raw.text,
        kind,
    })
}

fn convert_condition(node_id: &str, raw: RawCondition) -> Result<Condition, DslError> {
    let operator: ConditionOperator =
        raw.operator
            .parse()
            .map_err(|_| DslError::InvalidOperator {
                node_id: node_id.to_string(),
                operator: raw.operator.clone(),
            })?;

    // Numbers and booleans are compared as text by the engine
    let value = match raw.value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };

    Ok(Condition {
        variable: raw.variable,
        operator,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let json = r#"{
            "startNodeId": "start",
            "nodes": {
                "start": {"kind": "end", "text": "Goodbye"}
            }
        }"#;

        let graph = parse_json(json, Some("flow-1")).unwrap();
        assert_eq!(graph.id.as_str(), "flow-1");
        assert_eq!(graph.start_node_id.as_str(), "start");
        assert_eq!(graph.node("start").unwrap().kind, NodeKind::End);
        assert_eq!(graph.node("start").unwrap().text.as_deref(), Some("Goodbye"));
    }

    #[test]
    fn test_document_id_wins_over_fallback() {
        let json = r#"{"id": "doc-id", "startNodeId": "a", "nodes": {}}"#;
        assert_eq!(parse_json(json, Some("other")).unwrap().id.as_str(), "doc-id");
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let json = r#"{"startNodeId": "a", "nodes": {}}"#;
        match parse_json(json, None) {
            Err(DslError::MissingRequiredField(field)) => assert_eq!(field, "id"),
            other => panic!("Expected MissingRequiredField, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_syntax() {
        let result = parse_json("{ not json", Some("f"));
        assert!(matches!(result, Err(DslError::Json(_))));
    }

    #[test]
    fn test_conditional_wire_shape_becomes_branches() {
        let json = r#"{
            "startNodeId": "check",
            "nodes": {
                "check": {
                    "kind": "conditional",
                    "condition": {"variable": "age", "operator": "greater_than", "value": 17},
                    "successNodeId": "adult",
                    "failureNodeId": "minor"
                }
            }
        }"#;

        let graph = parse_json(json, Some("f")).unwrap();
        match &graph.node("check").unwrap().kind {
            NodeKind::Conditional { branches, default } => {
                assert_eq!(branches.len(), 1);
                assert_eq!(branches[0].condition.operator, ConditionOperator::GreaterThan);
                assert_eq!(branches[0].condition.value, "17");
                assert_eq!(branches[0].target.as_ref().unwrap().as_str(), "adult");
                assert_eq!(default.as_ref().unwrap().as_str(), "minor");
            }
            other => panic!("Expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_conditional_without_condition_is_rejected() {
        let json = r#"{"startNodeId": "c", "nodes": {"c": {"kind": "conditional"}}}"#;
        match parse_json(json, Some("f")) {
            Err(DslError::MissingNodeField { node_id, field }) => {
                assert_eq!(node_id, "c");
                assert_eq!(field, "condition");
            }
            other => panic!("Expected MissingNodeField, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let json = r#"{"startNodeId": "c", "nodes": {"c": {
            "kind": "conditional",
            "condition": {"variable": "x", "operator": "between", "value": "1"}
        }}}"#;
        assert!(matches!(
            parse_json(json, Some("f")),
            Err(DslError::InvalidOperator { .. })
        ));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{"startNodeId": "a", "nodes": {"a": {"kind": "sms"}}}"#;
        match parse_json(json, Some("f")) {
            Err(DslError::UnknownNodeKind { node_id, kind }) => {
                assert_eq!(node_id, "a");
                assert_eq!(kind, "sms");
            }
            other => panic!("Expected UnknownNodeKind, got {:?}", other),
        }
    }

    #[test]
    fn test_input_requires_spec() {
        let json = r#"{"startNodeId": "a", "nodes": {"a": {"kind": "input"}}}"#;
        assert!(matches!(
            parse_json(json, Some("f")),
            Err(DslError::MissingNodeField { field: "inputSpec", .. })
        ));
    }

    #[test]
    fn test_payment_defaults() {
        let json = r#"{"startNodeId": "pay", "nodes": {
            "pay": {"kind": "payment", "nextNodeId": "ok", "failureNodeId": "ko"},
            "call": {"kind": "api", "action": {"name": "lookup", "params": {"url": "/x"}}}
        }}"#;

        let graph = parse_json(json, Some("f")).unwrap();
        match &graph.node("pay").unwrap().kind {
            NodeKind::Payment(action) => {
                assert_eq!(action.action.name, "payment");
                assert_eq!(action.success.as_ref().unwrap().as_str(), "ok");
                assert_eq!(action.failure.as_ref().unwrap().as_str(), "ko");
            }
            other => panic!("Expected payment, got {:?}", other),
        }
        match &graph.node("call").unwrap().kind {
            NodeKind::Api(action) => {
                assert_eq!(action.action.name, "lookup");
                assert_eq!(action.action.params["url"], "/x");
                assert!(action.success.is_none());
            }
            other => panic!("Expected api, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_yaml_document() {
        let yaml = r#"
id: yaml-flow
startNodeId: start
nodes:
  start:
    kind: menu
    text: Welcome
    options:
      - key: "1"
        text: Balance
        targetNodeId: bal
      - key: "0"
        text: Exit
        targetNodeId: null
  bal:
    kind: end
"#;

        let graph = parse_yaml(yaml, None).unwrap();
        assert_eq!(graph.id.as_str(), "yaml-flow");
        match &graph.node("start").unwrap().kind {
            NodeKind::Menu { options } => {
                assert_eq!(options.len(), 2);
                assert!(options[1].target.is_none());
            }
            other => panic!("Expected menu, got {:?}", other),
        }
    }
}
