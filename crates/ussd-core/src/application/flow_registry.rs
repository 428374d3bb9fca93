use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use ussd_dsl::{validate, DslError, FlowGraph, FlowId, ValidationResult};

use crate::domain::repository::FlowRepository;
use crate::CoreError;

/// Validates flows and makes them available to new sessions.
///
/// Publishing never changes a graph already in service: each publish stores
/// a new version and switches new sessions to it, while running sessions keep
/// the version they started on.
pub struct FlowRegistry {
    flow_repo: Arc<dyn FlowRepository>,
    // Serializes version assignment
    publish_lock: Mutex<()>,
}

impl FlowRegistry {
    /// Create a new flow registry
    pub fn new(flow_repo: Arc<dyn FlowRepository>) -> Self {
        Self {
            flow_repo,
            publish_lock: Mutex::new(()),
        }
    }

    /// Run the graph validator without publishing
    pub fn validate_flow(&self, graph: &FlowGraph) -> ValidationResult {
        validate(graph)
    }

    /// Validate and publish a graph, returning the version it was assigned.
    /// Graphs with error-severity issues are rejected.
    pub async fn publish(&self, graph: FlowGraph) -> Result<u32, CoreError> {
        let result = validate(&graph);
        if !result.is_valid() {
            warn!(
                flow_id = %graph.id,
                errors = result.errors.len(),
                "Rejected flow with validation errors"
            );
            return Err(DslError::Validation(result.errors).into());
        }

        let _guard = self.publish_lock.lock().await;
        let version = self
            .flow_repo
            .latest_version(&graph.id)
            .await?
            .unwrap_or(0)
            + 1;

        let graph = Arc::new(graph.with_version(version));
        self.flow_repo.publish(graph.clone()).await?;

        info!(
            flow_id = %graph.id,
            version,
            nodes = graph.node_count(),
            warnings = result.warnings.len(),
            "Flow published"
        );

        Ok(version)
    }

    /// Parse a JSON flow definition and publish it under `flow_id`.
    /// An `id` inside the document takes precedence.
    pub async fn publish_json(&self, flow_id: &str, json: &str) -> Result<u32, CoreError> {
        let graph = ussd_dsl::parse_flow_definition_with_id(flow_id, json)?;
        self.publish(graph).await
    }

    /// Stop starting new sessions on a flow
    pub async fn unpublish(&self, flow_id: &FlowId) -> Result<(), CoreError> {
        self.flow_repo.unpublish(flow_id).await?;
        info!(flow_id = %flow_id, "Flow unpublished");
        Ok(())
    }

    /// The version new sessions start on
    pub async fn current(&self, flow_id: &FlowId) -> Result<Option<Arc<FlowGraph>>, CoreError> {
        self.flow_repo.find_current(flow_id).await
    }

    /// Ids of flows currently in service
    pub async fn list_flows(&self) -> Result<Vec<FlowId>, CoreError> {
        self.flow_repo.list_flows().await
    }
}
