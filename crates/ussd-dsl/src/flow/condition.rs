use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::NodeId;

/// Comparison applied by a conditional node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Both sides are equal
    Equals,
    /// Both sides differ
    NotEquals,
    /// Variable is greater than the value
    GreaterThan,
    /// Variable is less than the value
    LessThan,
    /// Variable contains the value as a substring
    Contains,
    /// Variable starts with the value
    StartsWith,
}

impl ConditionOperator {
    /// Wire name of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::Contains => "contains",
            ConditionOperator::StartsWith => "starts_with",
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(ConditionOperator::Equals),
            "not_equals" => Ok(ConditionOperator::NotEquals),
            "greater_than" => Ok(ConditionOperator::GreaterThan),
            "less_than" => Ok(ConditionOperator::LessThan),
            "contains" => Ok(ConditionOperator::Contains),
            "starts_with" => Ok(ConditionOperator::StartsWith),
            other => Err(format!("unknown condition operator '{}'", other)),
        }
    }
}

/// A single comparison between a session variable and a literal value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Name of the session variable to read
    pub variable: String,

    /// Comparison to apply
    pub operator: ConditionOperator,

    /// Literal right-hand side, always held as text
    pub value: String,
}

/// One branch of a conditional node: taken when its condition holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalBranch {
    /// Condition guarding the branch
    pub condition: Condition,

    /// Node to continue at; `None` terminates the session
    pub target: Option<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trips_through_wire_name() {
        let all = [
            ConditionOperator::Equals,
            ConditionOperator::NotEquals,
            ConditionOperator::GreaterThan,
            ConditionOperator::LessThan,
            ConditionOperator::Contains,
            ConditionOperator::StartsWith,
        ];

        for op in all {
            assert_eq!(op.as_str().parse::<ConditionOperator>().unwrap(), op);
        }
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let err = "between".parse::<ConditionOperator>().unwrap_err();
        assert!(err.contains("between"));
    }
}
