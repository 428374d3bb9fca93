mod condition;
mod node;

pub use condition::{Condition, ConditionOperator, ConditionalBranch};
pub use node::{ActionConfig, ActionNode, Edge, EdgeVia, InputSpec, MenuOption, Node, NodeKind};

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a flow
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId(pub String);

impl FlowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlowId {
    fn from(s: &str) -> Self {
        FlowId(s.to_string())
    }
}

/// Identifier of a node, unique within one flow graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

/// A published flow: a directed graph of nodes with a single entry point.
///
/// A graph is a value. Editing a flow means building a new `FlowGraph` and
/// publishing it as a new version; live sessions keep reading the version
/// they started on.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowGraph {
    /// Flow this graph belongs to
    pub id: FlowId,

    /// Version number, assigned when the graph is published
    pub version: u32,

    /// Optional human-readable name
    pub name: Option<String>,

    /// Node where every session starts
    pub start_node_id: NodeId,

    // Sorted by id so that every traversal over the graph is deterministic
    nodes: BTreeMap<NodeId, Node>,
}

impl FlowGraph {
    /// Create an empty graph with the given entry point
    pub fn new(id: impl Into<FlowId>, start_node_id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            name: None,
            start_node_id: start_node_id.into(),
            nodes: BTreeMap::new(),
        }
    }

    /// Add a node, replacing any node with the same id
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Whether a node with this id exists
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// The entry node, if it exists
    pub fn start_node(&self) -> Option<&Node> {
        self.node(self.start_node_id.as_str())
    }

    /// All nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl From<String> for FlowId {
    fn from(s: String) -> Self {
        FlowId(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}
