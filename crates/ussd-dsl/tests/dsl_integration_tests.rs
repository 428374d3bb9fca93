use pretty_assertions::assert_eq;
use ussd_dsl::{
    parse_and_validate_flow_definition, parse_flow_definition, validate, Condition,
    ConditionOperator, ConditionalBranch, DslError, FlowGraph, IssueKind, MenuOption, Node,
    NodeKind,
};

const BANKING_FLOW: &str = r#"{
  "id": "banking",
  "name": "Mobile banking",
  "startNodeId": "start",
  "nodes": {
    "start": {
      "kind": "menu",
      "text": "Welcome to MyBank",
      "options": [
        {"key": "1", "text": "Check balance", "targetNodeId": "balance"},
        {"key": "2", "text": "Send money", "targetNodeId": "amount"},
        {"key": "0", "text": "Exit", "targetNodeId": null}
      ]
    },
    "balance": {"kind": "end", "text": "Your balance is {{balance}}"},
    "amount": {
      "kind": "input",
      "text": "Enter amount",
      "inputSpec": {"variableName": "amount", "required": true, "pattern": "^[0-9]+$"},
      "nextNodeId": "check"
    },
    "check": {
      "kind": "conditional",
      "condition": {"variable": "amount", "operator": "greater_than", "value": "1000"},
      "successNodeId": "too_much",
      "failureNodeId": "pay"
    },
    "too_much": {"kind": "end", "text": "Amount exceeds your limit"},
    "pay": {
      "kind": "payment",
      "action": {"name": "transfer", "params": {"currency": "KES"}},
      "successNodeId": "sent",
      "failureNodeId": "failed"
    },
    "sent": {"kind": "end", "text": "Sent {{amount}}"},
    "failed": {"kind": "end", "text": "Transfer failed"}
  }
}"#;

fn menu(id: &str, targets: &[&str]) -> Node {
    let options = targets
        .iter()
        .enumerate()
        .map(|(i, t)| MenuOption::new(&(i + 1).to_string(), t, Some(t)))
        .collect();
    Node::menu(id, options)
}

#[test]
fn test_parse_and_validate_valid_flow() {
    let (graph, warnings) = parse_and_validate_flow_definition(BANKING_FLOW).unwrap();

    assert_eq!(graph.id.as_str(), "banking");
    assert_eq!(graph.name.as_deref(), Some("Mobile banking"));
    assert_eq!(graph.node_count(), 8);
    assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
}

#[test]
fn test_validation_is_deterministic() {
    let graph = parse_flow_definition(BANKING_FLOW).unwrap();
    let broken = graph
        .clone()
        .with_node(menu("loop_a", &["loop_b"]))
        .with_node(menu("loop_b", &["loop_a", "nowhere"]));

    assert_eq!(validate(&graph), validate(&graph));
    assert_eq!(validate(&broken), validate(&broken));
}

#[test]
fn test_adding_unreachable_node_adds_exactly_one_warning() {
    let graph = parse_flow_definition(BANKING_FLOW).unwrap();
    let before = validate(&graph);

    let extended = graph.with_node(Node::end("forgotten"));
    let after = validate(&extended);

    let unreachable = after.of_kind(IssueKind::UnreachableNode);
    assert_eq!(unreachable.len(), before.of_kind(IssueKind::UnreachableNode).len() + 1);
    assert_eq!(unreachable.len(), 1);
    assert_eq!(
        unreachable[0].node_id.as_ref().map(|n| n.as_str()),
        Some("forgotten")
    );
    assert_eq!(after.errors, before.errors);
}

#[test]
fn test_cycle_among_menu_and_conditional_is_reported() {
    let conditional = Node::new(
        "gate",
        NodeKind::Conditional {
            branches: vec![ConditionalBranch {
                condition: Condition {
                    variable: "retry".into(),
                    operator: ConditionOperator::Equals,
                    value: "yes".into(),
                },
                target: Some("menu".into()),
            }],
            default: Some("bye".into()),
        },
    );
    let graph = FlowGraph::new("loops", "menu")
        .with_node(menu("menu", &["gate"]))
        .with_node(conditional)
        .with_node(Node::end("bye"));

    let result = validate(&graph);
    let cycles = result.of_kind(IssueKind::CircularReference);

    assert!(!result.is_valid());
    assert!(!cycles.is_empty());
    for issue in cycles {
        let node = issue.node_id.as_ref().map(|n| n.as_str());
        assert!(matches!(node, Some("menu") | Some("gate")), "{:?}", node);
    }
}

#[test]
fn test_acyclic_graph_has_no_cycle_errors() {
    // Diamond: two paths into the same node is not a cycle
    let graph = FlowGraph::new("diamond", "a")
        .with_node(menu("a", &["b", "c"]))
        .with_node(menu("b", &["d"]))
        .with_node(menu("c", &["d"]))
        .with_node(Node::end("d"));

    let result = validate(&graph);
    assert!(!result.has(IssueKind::CircularReference));
    assert!(result.is_valid());
}

#[test]
fn test_rejected_flow_reports_every_error() {
    let json = r#"{
      "id": "bad",
      "startNodeId": "start",
      "nodes": {
        "start": {
          "kind": "menu",
          "options": [
            {"key": "1", "text": "A", "targetNodeId": "ghost"},
            {"key": "1", "text": "B", "targetNodeId": "done"}
          ]
        },
        "done": {"kind": "end"}
      }
    }"#;

    let err = parse_and_validate_flow_definition(json).unwrap_err();
    let kinds: Vec<IssueKind> = err.issues().iter().map(|i| i.kind).collect();

    assert_eq!(
        kinds,
        vec![IssueKind::DuplicateOptionKey, IssueKind::DanglingReference]
    );
    assert!(err.to_string().contains("Multiple validation errors (2 issues)"));
}

#[test]
fn test_malformed_documents() {
    let missing_start = r#"{"id": "x", "nodes": {}}"#;
    assert!(matches!(
        parse_flow_definition(missing_start),
        Err(DslError::Json(_))
    ));

    let unknown_kind = r#"{"id": "x", "startNodeId": "a", "nodes": {"a": {"kind": "ussd_push"}}}"#;
    let err = parse_flow_definition(unknown_kind).unwrap_err();
    assert_eq!(err.error_code(), "ERR_DSL_UNKNOWN_NODE_KIND");
}
