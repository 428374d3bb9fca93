use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use ussd_dsl::{ActionNode, FlowId, Node, NodeId, NodeKind};

use super::{kind_mismatch, HandlerContext, NodeHandler, NodeResult};
use crate::application::prompt::interpolate_value;
use crate::domain::session::SessionId;
use crate::CoreError;

/// Shown when an action fails and the node has nowhere to route the failure
const ACTION_FAILED_MESSAGE: &str = "Unable to complete your request. Please try again.";

/// Which node kind requested the action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Payment,
    Api,
}

/// Everything an executor needs to perform one side-effecting call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub session_id: SessionId,
    pub flow_id: FlowId,
    pub node_id: NodeId,
    pub kind: ActionKind,
    /// Action name from the node
    pub action: String,
    /// Node parameters with `{{var}}` placeholders filled in
    pub params: Value,
    pub phone_number: String,
    pub variables: HashMap<String, String>,
}

/// Outcome reported by an executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    /// Variables returned here are merged into the session
    Success {
        #[serde(default)]
        variables: HashMap<String, String>,
    },
    Failure { reason: String },
}

impl ActionResult {
    pub fn success() -> Self {
        ActionResult::Success {
            variables: HashMap::new(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        ActionResult::Failure {
            reason: reason.into(),
        }
    }
}

/// Capability to perform payments and API calls on behalf of a session
#[async_trait]
pub trait ExternalActionExecutor: Send + Sync {
    async fn execute(&self, request: ActionRequest) -> Result<ActionResult, CoreError>;
}

/// Calls the executor under a timeout and routes on the result
pub struct ActionHandler {
    executor: Arc<dyn ExternalActionExecutor>,
    timeout: Duration,
}

impl ActionHandler {
    pub fn new(executor: Arc<dyn ExternalActionExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    async fn run(&self, request: ActionRequest) -> ActionResult {
        let action = request.action.clone();
        let node_id = request.node_id.clone();

        match tokio::time::timeout(self.timeout, self.executor.execute(request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(node_id = %node_id, action = %action, error = %err, "External action failed");
                ActionResult::failure(err.to_string())
            }
            Err(_) => {
                warn!(
                    node_id = %node_id,
                    action = %action,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "External action timed out"
                );
                ActionResult::failure("timeout")
            }
        }
    }
}

#[async_trait]
impl NodeHandler for ActionHandler {
    async fn handle(&self, node: &Node, ctx: &HandlerContext<'_>, _input: &str) -> NodeResult {
        let (kind, config): (ActionKind, &ActionNode) = match &node.kind {
            NodeKind::Payment(config) => (ActionKind::Payment, config),
            NodeKind::Api(config) => (ActionKind::Api, config),
            _ => return kind_mismatch(node, "payment or api"),
        };

        let request = ActionRequest {
            session_id: ctx.session_id.clone(),
            flow_id: ctx.flow_id.clone(),
            node_id: node.id.clone(),
            kind,
            action: config.action.name.clone(),
            params: interpolate_value(&config.action.params, ctx.variables),
            phone_number: ctx.phone_number.to_string(),
            variables: ctx.variables.clone(),
        };

        match self.run(request).await {
            ActionResult::Success { variables } => {
                debug!(node_id = %node.id, action = %config.action.name, "External action succeeded");
                NodeResult::follow(config.success.as_ref()).with_updates(variables)
            }
            ActionResult::Failure { reason } => {
                debug!(node_id = %node.id, action = %config.action.name, reason = %reason, "Routing action failure");
                match &config.failure {
                    Some(target) => NodeResult::follow(Some(target)),
                    None => NodeResult::error(ACTION_FAILED_MESSAGE),
                }
            }
        }
    }
}
