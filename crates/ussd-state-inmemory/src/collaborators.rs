//! In-memory stand-ins for the engine's external collaborators: an event
//! sink that keeps everything it receives and an action executor that
//! answers from a script.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use ussd_core::{
    ActionRequest, ActionResult, CoreError, DomainEvent, DomainEventHandler,
    ExternalActionExecutor, SessionId,
};

/// Keeps every event it is handed, as JSON
#[derive(Default)]
pub struct RecordingEventHandler {
    events: Arc<RwLock<Vec<Value>>>,
}

impl RecordingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events in arrival order
    pub async fn events(&self) -> Vec<Value> {
        self.events.read().await.clone()
    }

    /// Event types recorded for one session, in order
    pub async fn event_types_for(&self, session_id: &SessionId) -> Vec<String> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event["sessionId"] == session_id.0.as_str())
            .filter_map(|event| event["event"].as_str().map(str::to_string))
            .collect()
    }

    /// Number of recorded events of one type
    pub async fn count(&self, event_type: &str) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event["event"] == event_type)
            .count()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl DomainEventHandler for RecordingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        self.events.write().await.push(event.to_json());
        Ok(())
    }
}

#[derive(Clone)]
struct Script {
    result: Result<ActionResult, CoreError>,
    delay: Option<Duration>,
}

/// Answers action requests by action name.
///
/// Unscripted actions succeed without returning variables.
#[derive(Default)]
pub struct ScriptedActionExecutor {
    scripts: HashMap<String, Script>,
    calls: Arc<RwLock<Vec<ActionRequest>>>,
}

impl ScriptedActionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `action` with `result`
    pub fn on(mut self, action: &str, result: ActionResult) -> Self {
        self.scripts.insert(
            action.to_string(),
            Script {
                result: Ok(result),
                delay: None,
            },
        );
        self
    }

    /// Fail `action` with an executor error
    pub fn failing(mut self, action: &str, error: CoreError) -> Self {
        self.scripts.insert(
            action.to_string(),
            Script {
                result: Err(error),
                delay: None,
            },
        );
        self
    }

    /// Wait `delay` before answering `action`
    pub fn delayed(mut self, action: &str, delay: Duration) -> Self {
        self.scripts
            .entry(action.to_string())
            .or_insert_with(|| Script {
                result: Ok(ActionResult::success()),
                delay: None,
            })
            .delay = Some(delay);
        self
    }

    /// Requests received so far
    pub async fn calls(&self) -> Vec<ActionRequest> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl ExternalActionExecutor for ScriptedActionExecutor {
    async fn execute(&self, request: ActionRequest) -> Result<ActionResult, CoreError> {
        let script = self.scripts.get(&request.action).cloned();
        self.calls.write().await.push(request);

        match script {
            Some(script) => {
                if let Some(delay) = script.delay {
                    tokio::time::sleep(delay).await;
                }
                script.result
            }
            None => Ok(ActionResult::success()),
        }
    }
}
