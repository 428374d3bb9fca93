use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ussd_dsl::{FlowGraph, FlowId, Issue};

use crate::application::flow_registry::FlowRegistry;
use crate::application::session_engine::SessionEngine;
use crate::domain::session::{Session, SessionId};
use crate::CoreError;

/// Response to `create_session`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: SessionId,
    pub initial_prompt: String,
}

/// Response to `process_input`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputResponse {
    pub prompt: String,
    pub terminated: bool,
    pub error: Option<String>,
}

/// Response to `validate_flow`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowValidationReport {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

/// The API offered to the request-handling layer
#[derive(Clone)]
pub struct RuntimeInterface {
    engine: Arc<SessionEngine>,
    registry: Arc<FlowRegistry>,
}

impl RuntimeInterface {
    /// Create a new runtime interface
    pub fn new(engine: Arc<SessionEngine>, registry: Arc<FlowRegistry>) -> Self {
        Self { engine, registry }
    }

    /// Start or resume the session for a phone number on a flow
    pub async fn create_session(
        &self,
        flow_id: &str,
        phone_number: &str,
        ussd_code: &str,
    ) -> Result<SessionCreated, CoreError> {
        let start = self
            .engine
            .create_session(&FlowId::from(flow_id), phone_number, ussd_code)
            .await?;

        Ok(SessionCreated {
            session_id: start.session.id,
            initial_prompt: start.prompt,
        })
    }

    /// Feed one user input to a session
    pub async fn process_input(
        &self,
        session_id: &str,
        input: &str,
    ) -> Result<InputResponse, CoreError> {
        let result = self
            .engine
            .process_input(&SessionId(session_id.to_string()), input)
            .await?;

        Ok(InputResponse {
            prompt: result.prompt,
            terminated: result.terminated,
            error: result.error,
        })
    }

    /// End a session early
    pub async fn terminate_session(&self, session_id: &str, reason: &str) -> Result<(), CoreError> {
        self.engine
            .terminate_session(&SessionId(session_id.to_string()), reason)
            .await
            .map(|_| ())
    }

    /// Check a graph without publishing it
    pub fn validate_flow(&self, graph: &FlowGraph) -> FlowValidationReport {
        let result = self.registry.validate_flow(graph);
        FlowValidationReport {
            errors: result.errors,
            warnings: result.warnings,
        }
    }

    /// Publish a graph for new sessions, returning its version
    pub async fn publish_flow(&self, graph: FlowGraph) -> Result<u32, CoreError> {
        self.registry.publish(graph).await
    }

    /// Remove a flow from service
    pub async fn unpublish_flow(&self, flow_id: &str) -> Result<(), CoreError> {
        self.registry.unpublish(&FlowId::from(flow_id)).await
    }

    /// Current state of a session
    pub async fn get_session(&self, session_id: &str) -> Result<Session, CoreError> {
        self.engine
            .get_session(&SessionId(session_id.to_string()))
            .await
    }
}
