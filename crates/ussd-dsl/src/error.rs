use thiserror::Error;
use crate::validation::Issue;
use std::fmt;

/// All possible errors that can occur while loading a flow definition
#[derive(Error, Debug)]
pub enum DslError {
    /// The JSON document could not be parsed
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// The YAML document could not be parsed
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A node declares a kind the engine does not know
    #[error("Node '{node_id}' has unknown kind '{kind}'")]
    UnknownNodeKind { node_id: String, kind: String },

    /// A node lacks a field its kind requires
    #[error("Node '{node_id}' is missing required field '{field}'")]
    MissingNodeField { node_id: String, field: &'static str },

    /// A condition uses an operator the engine does not know
    #[error("Node '{node_id}' uses unknown condition operator '{operator}'")]
    InvalidOperator { node_id: String, operator: String },

    /// Missing document-level field
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// The graph parsed but has error-severity issues
    #[error("{}", MultipleErrorsFormat(.0))]
    Validation(Vec<Issue>),
}

// Helper struct to format validation issues
struct MultipleErrorsFormat<'a>(&'a [Issue]);

impl fmt::Display for MultipleErrorsFormat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [only] = self.0 {
            return write!(f, "Validation error: {}", only);
        }
        write!(f, "Multiple validation errors ({} issues):", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            write!(f, "\n  {}. {}", i + 1, err)?;
        }
        Ok(())
    }
}

impl DslError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DslError::Json(_) => "ERR_DSL_JSON_PARSE",
            DslError::Yaml(_) => "ERR_DSL_YAML_PARSE",
            DslError::UnknownNodeKind { .. } => "ERR_DSL_UNKNOWN_NODE_KIND",
            DslError::MissingNodeField { .. } => "ERR_DSL_MISSING_NODE_FIELD",
            DslError::InvalidOperator { .. } => "ERR_DSL_INVALID_OPERATOR",
            DslError::MissingRequiredField(_) => "ERR_DSL_MISSING_FIELD",
            DslError::Validation(_) => "ERR_DSL_VALIDATION",
        }
    }

    /// Validation issues carried by this error, if any
    pub fn issues(&self) -> &[Issue] {
        match self {
            DslError::Validation(issues) => issues,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::NodeId;
    use crate::validation::IssueKind;

    #[test]
    fn test_multiple_issues_are_numbered() {
        let a = NodeId::from("a");
        let err = DslError::Validation(vec![
            Issue::new(IssueKind::DanglingReference, Some(&a), "first"),
            Issue::new(IssueKind::CircularReference, Some(&a), "second"),
        ]);

        let text = err.to_string();
        assert!(text.starts_with("Multiple validation errors (2 issues):"));
        assert!(text.contains("1. dangling_reference: first"));
        assert!(text.contains("2. circular_reference: second"));
        assert_eq!(err.error_code(), "ERR_DSL_VALIDATION");
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn test_single_issue_display() {
        let err = DslError::Validation(vec![Issue::new(
            IssueKind::MissingStartNode,
            None,
            "no start",
        )]);
        assert_eq!(err.to_string(), "Validation error: missing_start_node: no start");
    }
}
