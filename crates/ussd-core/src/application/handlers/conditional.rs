use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use ussd_dsl::{Condition, ConditionOperator, Node, NodeKind};

use super::{kind_mismatch, HandlerContext, NodeHandler, NodeResult};

/// Evaluates a branch condition against session variables
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, condition: &Condition, variables: &HashMap<String, String>) -> bool;
}

/// Compares numerically when both sides parse as finite numbers, otherwise
/// as strings. A missing variable compares as the empty string.
pub struct DefaultConditionEvaluator;

fn as_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn compare(left: &str, right: &str) -> Ordering {
    match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

impl ConditionEvaluator for DefaultConditionEvaluator {
    fn evaluate(&self, condition: &Condition, variables: &HashMap<String, String>) -> bool {
        let left = variables
            .get(&condition.variable)
            .map(String::as_str)
            .unwrap_or("");
        let right = condition.value.as_str();

        match condition.operator {
            ConditionOperator::Equals => compare(left, right) == Ordering::Equal,
            ConditionOperator::NotEquals => compare(left, right) != Ordering::Equal,
            ConditionOperator::GreaterThan => compare(left, right) == Ordering::Greater,
            ConditionOperator::LessThan => compare(left, right) == Ordering::Less,
            ConditionOperator::Contains => left.contains(right),
            ConditionOperator::StartsWith => left.starts_with(right),
        }
    }
}

/// Routes to the first branch whose condition holds, else the default
pub struct ConditionalHandler {
    evaluator: Arc<dyn ConditionEvaluator>,
}

impl ConditionalHandler {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl NodeHandler for ConditionalHandler {
    async fn handle(&self, node: &Node, ctx: &HandlerContext<'_>, _input: &str) -> NodeResult {
        let NodeKind::Conditional { branches, default } = &node.kind else {
            return kind_mismatch(node, "conditional");
        };

        let taken = branches
            .iter()
            .find(|branch| self.evaluator.evaluate(&branch.condition, ctx.variables));

        match taken {
            Some(branch) => NodeResult::follow(branch.target.as_ref()),
            None => NodeResult::follow(default.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::Fixture;
    use crate::application::handlers::NavigationOutcome;
    use ussd_dsl::{ConditionalBranch, NodeId};

    fn cond(variable: &str, operator: ConditionOperator, value: &str) -> Condition {
        Condition {
            variable: variable.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    fn eval(variable_value: Option<&str>, operator: ConditionOperator, value: &str) -> bool {
        let mut variables = HashMap::new();
        if let Some(v) = variable_value {
            variables.insert("x".to_string(), v.to_string());
        }
        DefaultConditionEvaluator.evaluate(&cond("x", operator, value), &variables)
    }

    #[test]
    fn test_numeric_coercion() {
        // "5" > "3" and "10" > "9" only hold numerically for the second
        assert!(eval(Some("5"), ConditionOperator::GreaterThan, "3"));
        assert!(eval(Some("10"), ConditionOperator::GreaterThan, "9"));
        assert!(eval(Some("2.50"), ConditionOperator::Equals, "2.5"));
        assert!(eval(Some("007"), ConditionOperator::LessThan, "8"));
    }

    #[test]
    fn test_string_comparison_fallback() {
        assert!(eval(Some("10"), ConditionOperator::LessThan, "9a"));
        assert!(eval(Some("b"), ConditionOperator::GreaterThan, "a"));
        assert!(eval(Some("yes"), ConditionOperator::Equals, "yes"));
        assert!(eval(Some("yes"), ConditionOperator::NotEquals, "no"));
    }

    #[test]
    fn test_substring_operators() {
        assert!(eval(Some("0712345678"), ConditionOperator::StartsWith, "07"));
        assert!(eval(Some("premium-user"), ConditionOperator::Contains, "premium"));
        assert!(!eval(Some("basic"), ConditionOperator::Contains, "premium"));
    }

    #[test]
    fn test_missing_variable_is_empty() {
        assert!(eval(None, ConditionOperator::Equals, ""));
        assert!(!eval(None, ConditionOperator::GreaterThan, "0"));
        assert!(eval(None, ConditionOperator::StartsWith, ""));
    }

    #[tokio::test]
    async fn test_first_matching_branch_wins() {
        let node = Node::new(
            "route",
            NodeKind::Conditional {
                branches: vec![
                    ConditionalBranch {
                        condition: cond("age", ConditionOperator::GreaterThan, "64"),
                        target: Some("senior".into()),
                    },
                    ConditionalBranch {
                        condition: cond("age", ConditionOperator::GreaterThan, "17"),
                        target: Some("adult".into()),
                    },
                ],
                default: Some("minor".into()),
            },
        );
        let handler = ConditionalHandler::new(Arc::new(DefaultConditionEvaluator));

        let cases = [("70", "senior"), ("30", "adult"), ("5", "minor")];
        for (age, expected) in cases {
            let fixture = Fixture::new(&[("age", age)]);
            let result = handler.handle(&node, &fixture.ctx(), "").await;
            assert_eq!(result.outcome, NavigationOutcome::Next(NodeId::from(expected)));
        }
    }

    #[tokio::test]
    async fn test_no_match_and_no_default_terminates() {
        let node = Node::new(
            "route",
            NodeKind::Conditional {
                branches: vec![ConditionalBranch {
                    condition: cond("plan", ConditionOperator::Equals, "gold"),
                    target: Some("gold".into()),
                }],
                default: None,
            },
        );
        let fixture = Fixture::new(&[("plan", "silver")]);
        let result = ConditionalHandler::new(Arc::new(DefaultConditionEvaluator))
            .handle(&node, &fixture.ctx(), "")
            .await;

        assert_eq!(result.outcome, NavigationOutcome::Terminate);
    }
}
