use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ConditionalBranch, NodeId};

/// A single step in a flow
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique id within the graph
    pub id: NodeId,

    /// Prompt shown to the user when the session arrives at this node
    pub text: Option<String>,

    /// Kind-specific configuration
    pub kind: NodeKind,
}

/// Kind-specific node configuration. Each variant carries only the fields
/// its handler reads.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Choose one of a fixed set of keyed options
    Menu { options: Vec<MenuOption> },

    /// Capture free text into a session variable
    Input {
        spec: InputSpec,
        next: Option<NodeId>,
    },

    /// Route on session variables without user input
    Conditional {
        branches: Vec<ConditionalBranch>,
        default: Option<NodeId>,
    },

    /// Call the payment gateway
    Payment(ActionNode),

    /// Call an external API
    Api(ActionNode),

    /// Terminal node
    End,
}

impl NodeKind {
    /// Wire name of the kind
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Menu { .. } => "menu",
            NodeKind::Input { .. } => "input",
            NodeKind::Conditional { .. } => "conditional",
            NodeKind::Payment(_) => "payment",
            NodeKind::Api(_) => "api",
            NodeKind::End => "end",
        }
    }

    /// Whether the node waits for user input before it can be resolved
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            NodeKind::Menu { .. } | NodeKind::Input { .. } | NodeKind::End
        )
    }
}

/// A selectable choice on a menu node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuOption {
    pub key: String,
    pub text: String,
    /// `None` terminates the session
    #[serde(rename = "targetNodeId", default)]
    pub target: Option<NodeId>,
}

/// How an input node validates and stores what the user typed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSpec {
    pub variable_name: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub pattern: Option<String>,
}

fn default_required() -> bool {
    true
}

/// Name and parameters of an external action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Shared shape of payment and api nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode {
    pub action: ActionConfig,
    pub success: Option<NodeId>,
    pub failure: Option<NodeId>,
}

/// The label on an outgoing edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeVia<'a> {
    Option(&'a str),
    Next,
    Branch(usize),
    Default,
    Success,
    Failure,
}

impl fmt::Display for EdgeVia<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeVia::Option(key) => write!(f, "option '{}'", key),
            EdgeVia::Next => f.write_str("next"),
            EdgeVia::Branch(i) => write!(f, "branch {}", i),
            EdgeVia::Default => f.write_str("default"),
            EdgeVia::Success => f.write_str("success"),
            EdgeVia::Failure => f.write_str("failure"),
        }
    }
}

/// An outgoing edge to a (possibly missing) node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge<'a> {
    pub via: EdgeVia<'a>,
    pub target: &'a NodeId,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            text: None,
            kind,
        }
    }

    pub fn menu(id: impl Into<NodeId>, options: Vec<MenuOption>) -> Self {
        Self::new(id, NodeKind::Menu { options })
    }

    pub fn input(id: impl Into<NodeId>, spec: InputSpec, next: Option<&str>) -> Self {
        Self::new(
            id,
            NodeKind::Input {
                spec,
                next: next.map(NodeId::from),
            },
        )
    }

    pub fn end(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::End)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Every non-null outgoing edge, in declaration order
    pub fn edges(&self) -> Vec<Edge<'_>> {
        let mut edges = Vec::new();
        match &self.kind {
            NodeKind::Menu { options } => {
                for option in options {
                    if let Some(target) = &option.target {
                        edges.push(Edge {
                            via: EdgeVia::Option(&option.key),
                            target,
                        });
                    }
                }
            }
            NodeKind::Input { next, .. } => {
                if let Some(target) = next {
                    edges.push(Edge {
                        via: EdgeVia::Next,
                        target,
                    });
                }
            }
            NodeKind::Conditional { branches, default } => {
                for (i, branch) in branches.iter().enumerate() {
                    if let Some(target) = &branch.target {
                        edges.push(Edge {
                            via: EdgeVia::Branch(i),
                            target,
                        });
                    }
                }
                if let Some(target) = default {
                    edges.push(Edge {
                        via: EdgeVia::Default,
                        target,
                    });
                }
            }
            NodeKind::Payment(action) | NodeKind::Api(action) => {
                if let Some(target) = &action.success {
                    edges.push(Edge {
                        via: EdgeVia::Success,
                        target,
                    });
                }
                if let Some(target) = &action.failure {
                    edges.push(Edge {
                        via: EdgeVia::Failure,
                        target,
                    });
                }
            }
            NodeKind::End => {}
        }
        edges
    }
}

impl MenuOption {
    pub fn new(key: &str, text: &str, target: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            text: text.to_string(),
            target: target.map(NodeId::from),
        }
    }
}

impl InputSpec {
    pub fn new(variable_name: &str) -> Self {
        Self {
            variable_name: variable_name.to_string(),
            required: true,
            pattern: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }
}
