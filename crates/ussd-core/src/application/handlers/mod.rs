//! Node type handlers.
//!
//! A handler interprets one input at one node and reports where the session
//! should go next. Handlers never touch the session: variable changes are
//! returned in [`NodeResult::updates`] and applied by the session engine only
//! when the whole transition succeeds.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use ussd_dsl::{FlowId, Node, NodeId, NodeKind};

use crate::domain::session::SessionId;

mod action;
mod conditional;
mod input;
mod menu;

pub use action::{ActionHandler, ActionKind, ActionRequest, ActionResult, ExternalActionExecutor};
pub use conditional::{ConditionEvaluator, ConditionalHandler, DefaultConditionEvaluator};
pub use input::InputHandler;
pub use menu::MenuHandler;

/// Where a session goes after a node handled an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Continue at another node
    Next(NodeId),

    /// End the session normally
    Terminate,

    /// Stay at the current node and re-prompt with this message
    Error(String),
}

/// Outcome plus the variable changes it depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResult {
    pub outcome: NavigationOutcome,
    pub updates: HashMap<String, String>,
}

impl NodeResult {
    /// Follow an edge; a null target terminates
    pub fn follow(target: Option<&NodeId>) -> Self {
        let outcome = match target {
            Some(id) => NavigationOutcome::Next(id.clone()),
            None => NavigationOutcome::Terminate,
        };
        Self {
            outcome,
            updates: HashMap::new(),
        }
    }

    pub fn terminate() -> Self {
        Self::follow(None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            outcome: NavigationOutcome::Error(message.into()),
            updates: HashMap::new(),
        }
    }

    pub fn with_update(mut self, name: &str, value: &str) -> Self {
        self.updates.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_updates(mut self, updates: HashMap<String, String>) -> Self {
        self.updates.extend(updates);
        self
    }
}

/// Read-only view of the session a handler runs for
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub session_id: &'a SessionId,
    pub flow_id: &'a FlowId,
    pub phone_number: &'a str,
    /// Variables as they will be if the transition so far succeeds
    pub variables: &'a HashMap<String, String>,
}

/// Behavior of one node kind
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Interpret `input` at `node`
    async fn handle(&self, node: &Node, ctx: &HandlerContext<'_>, input: &str) -> NodeResult;
}

/// `end` nodes expect no input; whatever arrives ends the session
pub struct EndHandler;

#[async_trait]
impl NodeHandler for EndHandler {
    async fn handle(&self, _node: &Node, _ctx: &HandlerContext<'_>, _input: &str) -> NodeResult {
        NodeResult::terminate()
    }
}

/// Dispatches by node kind to the matching handler
pub struct NodeHandlers {
    menu: MenuHandler,
    input: InputHandler,
    conditional: ConditionalHandler,
    action: ActionHandler,
    end: EndHandler,
}

impl NodeHandlers {
    pub fn new(executor: Arc<dyn ExternalActionExecutor>, action_timeout: Duration) -> Self {
        Self {
            menu: MenuHandler,
            input: InputHandler::new(),
            conditional: ConditionalHandler::new(Arc::new(DefaultConditionEvaluator)),
            action: ActionHandler::new(executor, action_timeout),
            end: EndHandler,
        }
    }

    /// Replace the condition evaluator used by conditional nodes
    pub fn with_condition_evaluator(mut self, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        self.conditional = ConditionalHandler::new(evaluator);
        self
    }

    pub fn handler_for(&self, kind: &NodeKind) -> &dyn NodeHandler {
        match kind {
            NodeKind::Menu { .. } => &self.menu,
            NodeKind::Input { .. } => &self.input,
            NodeKind::Conditional { .. } => &self.conditional,
            NodeKind::Payment(_) | NodeKind::Api(_) => &self.action,
            NodeKind::End => &self.end,
        }
    }

    pub async fn dispatch(&self, node: &Node, ctx: &HandlerContext<'_>, input: &str) -> NodeResult {
        self.handler_for(&node.kind).handle(node, ctx, input).await
    }
}

/// Result for a node routed to a handler of another kind
pub(crate) fn kind_mismatch(node: &Node, expected: &str) -> NodeResult {
    tracing::error!(
        node_id = %node.id,
        kind = node.kind.name(),
        expected,
        "Node dispatched to the wrong handler"
    );
    NodeResult::error("Service error, please try again")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub struct Fixture {
        pub session_id: SessionId,
        pub flow_id: FlowId,
        pub variables: HashMap<String, String>,
    }

    impl Fixture {
        pub fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                session_id: SessionId("s-1".to_string()),
                flow_id: FlowId("f-1".to_string()),
                variables: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            }
        }

        pub fn ctx(&self) -> HandlerContext<'_> {
            HandlerContext {
                session_id: &self.session_id,
                flow_id: &self.flow_id,
                phone_number: "+254700000001",
                variables: &self.variables,
            }
        }
    }
}
