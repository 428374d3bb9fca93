use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use ussd_dsl::{FlowGraph, FlowId, Node, NodeId, NodeKind};

use crate::application::handlers::{
    ExternalActionExecutor, HandlerContext, NavigationOutcome, NodeHandlers,
};
use crate::application::locks::SessionLocks;
use crate::application::prompt::{render_error, render_node};
use crate::config::EngineConfig;
use crate::domain::events::DomainEvent;
use crate::domain::repository::{FlowRepository, SessionRepository, UsageRecorder};
use crate::domain::session::{Session, SessionId, SessionStatus};
use crate::CoreError;

/// Shown when a chain of automatic transitions does not settle
const AUTO_TRANSITION_LIMIT_MESSAGE: &str = "Unable to process your request. Please try again.";

/// Handler for domain events
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Handle a domain event
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
}

/// Forwards each event to several handlers in order.
///
/// Events are not cloneable, so every handler after the first receives a
/// [`ForwardedEvent`] snapshot of the original.
pub struct CompositeEventHandler {
    handlers: Vec<Arc<dyn DomainEventHandler>>,
}

impl CompositeEventHandler {
    pub fn new(handlers: Vec<Arc<dyn DomainEventHandler>>) -> Self {
        Self { handlers }
    }
}

#[async_trait]
impl DomainEventHandler for CompositeEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        let Some((first, rest)) = self.handlers.split_first() else {
            return Ok(());
        };

        let snapshot = ForwardedEvent::capture(event.as_ref());
        let mut outcome = first.handle_event(event).await;

        for handler in rest {
            let result = handler.handle_event(Box::new(snapshot.clone())).await;
            if outcome.is_ok() {
                outcome = result;
            }
        }

        outcome
    }
}

/// Owned copy of an event's common fields and attributes
#[derive(Debug, Clone)]
pub struct ForwardedEvent {
    event_type: &'static str,
    session_id: SessionId,
    flow_id: FlowId,
    node_id: Option<NodeId>,
    timestamp: DateTime<Utc>,
    attributes: serde_json::Value,
}

impl ForwardedEvent {
    pub fn capture(event: &dyn DomainEvent) -> Self {
        Self {
            event_type: event.event_type(),
            session_id: event.session_id().clone(),
            flow_id: event.flow_id().clone(),
            node_id: event.node_id().cloned(),
            timestamp: event.timestamp(),
            attributes: event.attributes(),
        }
    }
}

impl DomainEvent for ForwardedEvent {
    fn event_type(&self) -> &'static str {
        self.event_type
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    fn node_id(&self) -> Option<&NodeId> {
        self.node_id.as_ref()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> serde_json::Value {
        self.attributes.clone()
    }
}

/// Event handler that drops everything
pub struct NoopEventHandler;

#[async_trait]
impl DomainEventHandler for NoopEventHandler {
    async fn handle_event(&self, _event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        Ok(())
    }
}

/// A session handed back by [`SessionEngine::create_session`]
#[derive(Debug, Clone)]
pub struct SessionStart {
    pub session: Session,

    /// Text to show the user first
    pub prompt: String,

    /// An existing Active session was returned instead of a new one
    pub resumed: bool,
}

/// Response to one user input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationResult {
    pub session_id: SessionId,
    pub current_node_id: NodeId,
    pub prompt: String,
    pub terminated: bool,
    pub error: Option<String>,
    pub status: SessionStatus,
}

/// Where a chain of handler calls came to rest
enum ChainEnd {
    /// At an interactive node waiting for the next input
    Rest,
    Terminate,
    Error(String),
}

/// The result of running handlers from one node until the session settles.
/// Nothing here has touched the session yet.
struct Transition {
    /// Nodes entered, in order
    hops: Vec<NodeId>,
    variables: HashMap<String, String>,
    end: ChainEnd,

    /// A payment or api call completed along the way. Its effects cannot be
    /// undone, so an error later in the chain keeps the progress made.
    committed: bool,
}

/// Session state machine.
///
/// The only writer of session status and position. Every operation that
/// mutates a session runs inside that session's exclusive section and saves
/// the session before publishing its events.
pub struct SessionEngine {
    session_repo: Arc<dyn SessionRepository>,
    flow_repo: Arc<dyn FlowRepository>,
    usage: Arc<dyn UsageRecorder>,
    handlers: NodeHandlers,
    event_handler: Arc<dyn DomainEventHandler>,
    locks: SessionLocks,
    config: EngineConfig,
}

impl SessionEngine {
    /// Create a new session engine
    pub fn new(
        session_repo: Arc<dyn SessionRepository>,
        flow_repo: Arc<dyn FlowRepository>,
        usage: Arc<dyn UsageRecorder>,
        executor: Arc<dyn ExternalActionExecutor>,
        event_handler: Arc<dyn DomainEventHandler>,
        config: EngineConfig,
    ) -> Self {
        let handlers = NodeHandlers::new(executor, config.external_action_timeout());
        Self {
            session_repo,
            flow_repo,
            usage,
            handlers,
            event_handler,
            locks: SessionLocks::new(),
            config,
        }
    }

    /// Replace the node handlers, e.g. to install a custom condition evaluator
    pub fn with_handlers(mut self, handlers: NodeHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Sessions or creation triples with a live exclusive section
    pub fn held_locks(&self) -> usize {
        self.locks.len()
    }

    /// Start a session for `phone_number` on the current version of a flow,
    /// or return the Active session the triple already has.
    pub async fn create_session(
        &self,
        flow_id: &FlowId,
        phone_number: &str,
        ussd_code: &str,
    ) -> Result<SessionStart, CoreError> {
        self.create_session_at(flow_id, phone_number, ussd_code, Utc::now())
            .await
    }

    /// [`create_session`](Self::create_session) with an explicit clock reading
    pub async fn create_session_at(
        &self,
        flow_id: &FlowId,
        phone_number: &str,
        ussd_code: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionStart, CoreError> {
        let _creation = self
            .locks
            .lock_creation(flow_id, phone_number, ussd_code)
            .await;
        self.start_or_resume(flow_id, phone_number, ussd_code, now)
            .await
    }

    async fn start_or_resume(
        &self,
        flow_id: &FlowId,
        phone_number: &str,
        ussd_code: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionStart, CoreError> {
        let graph = self
            .flow_repo
            .find_current(flow_id)
            .await?
            .ok_or_else(|| CoreError::FlowNotFound(flow_id.to_string()))?;

        if let Some(existing) = self
            .session_repo
            .find_active(flow_id, phone_number, ussd_code)
            .await?
        {
            if !existing.is_lapsed(now) {
                debug!(session_id = %existing.id, flow_id = %flow_id, "Resuming active session");
                let existing_graph = self.graph_for(&existing).await?;
                let node = self.node_at(&existing_graph, &existing, &existing.current_node_id)?;
                let prompt = render_node(node, &existing.variables);
                return Ok(SessionStart {
                    session: existing,
                    prompt,
                    resumed: true,
                });
            }

            self.expire_if_lapsed(&existing.id, now).await?;
        }

        let mut session = Session::new(
            &graph,
            phone_number,
            ussd_code,
            self.config.session_timeout(),
            now,
        );

        let start = self.node_at(&graph, &session, &graph.start_node_id)?;
        let prompt = if start.kind.is_interactive() {
            render_node(start, &session.variables)
        } else {
            // Resolve a non-interactive start before the first prompt
            let transition = self.run_chain(&graph, &session, start, "").await?;
            let result = self.apply(&graph, &mut session, transition, now)?;
            if result.terminated {
                self.record_usage(&session).await;
            }
            result.prompt
        };

        self.session_repo.save(&session).await?;
        info!(
            session_id = %session.id,
            flow_id = %flow_id,
            flow_version = session.flow_version,
            "Session started"
        );
        self.handle_events(&mut session).await;

        Ok(SessionStart {
            session,
            prompt,
            resumed: false,
        })
    }

    /// Interpret one user input for a session
    pub async fn process_input(
        &self,
        session_id: &SessionId,
        raw_input: &str,
    ) -> Result<NavigationResult, CoreError> {
        self.process_input_at(session_id, raw_input, Utc::now()).await
    }

    /// [`process_input`](Self::process_input) with an explicit clock reading
    pub async fn process_input_at(
        &self,
        session_id: &SessionId,
        raw_input: &str,
        now: DateTime<Utc>,
    ) -> Result<NavigationResult, CoreError> {
        let _guard = self.locks.lock_session(session_id).await;
        let mut session = self.load(session_id).await?;

        if !session.is_active() {
            return Err(CoreError::InvalidState(format!(
                "Cannot process input in state: {:?}",
                session.status
            )));
        }

        if session.is_lapsed(now) {
            session.expire(now)?;
            self.session_repo.save(&session).await?;
            info!(session_id = %session.id, "Session expired on input");
            self.handle_events(&mut session).await;
            return Err(CoreError::InvalidState(format!(
                "Cannot process input in state: {:?}",
                session.status
            )));
        }

        let graph = self.graph_for(&session).await?;
        session.record_input(raw_input, self.config.session_timeout(), now)?;

        let current = self.node_at(&graph, &session, &session.current_node_id)?;
        let transition = self.run_chain(&graph, &session, current, raw_input).await?;
        let result = self.apply(&graph, &mut session, transition, now)?;

        if result.terminated {
            self.record_usage(&session).await;
        }

        self.session_repo.save(&session).await?;
        self.handle_events(&mut session).await;

        Ok(result)
    }

    /// Cancel a session on behalf of the user or a policy
    pub async fn terminate_session(
        &self,
        session_id: &SessionId,
        reason: &str,
    ) -> Result<Session, CoreError> {
        let _guard = self.locks.lock_session(session_id).await;
        let mut session = self.load(session_id).await?;

        session.terminate(reason, Utc::now())?;
        self.session_repo.save(&session).await?;
        info!(session_id = %session.id, reason, "Session terminated");
        self.handle_events(&mut session).await;
        Ok(session)
    }

    /// Finish a session normally and count it against its flow
    pub async fn complete_session(&self, session_id: &SessionId) -> Result<Session, CoreError> {
        let _guard = self.locks.lock_session(session_id).await;
        let mut session = self.load(session_id).await?;

        session.complete(Utc::now())?;
        self.record_usage(&session).await;
        self.session_repo.save(&session).await?;
        info!(session_id = %session.id, steps = session.step_count, "Session completed");
        self.handle_events(&mut session).await;
        Ok(session)
    }

    /// Current state of a session
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session, CoreError> {
        self.load(session_id).await
    }

    /// Move a session to `Expired` if it is Active and past its expiry time.
    /// Returns whether it was expired by this call.
    pub(crate) async fn expire_if_lapsed(
        &self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let _guard = self.locks.lock_session(session_id).await;

        // Reload under the lock; an input may have renewed it meanwhile
        let Some(mut session) = self.session_repo.find_by_id(session_id).await? else {
            return Ok(false);
        };
        if !session.is_lapsed(now) {
            return Ok(false);
        }

        session.expire(now)?;
        self.session_repo.save(&session).await?;
        debug!(session_id = %session.id, flow_id = %session.flow_id, "Session expired");
        self.handle_events(&mut session).await;
        Ok(true)
    }

    /// Check that `node_id` exists in the session's graph before moving there
    pub fn navigate_to(
        &self,
        graph: &FlowGraph,
        session: &mut Session,
        node_id: NodeId,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if !graph.contains(node_id.as_str()) {
            return Err(self.structural(
                session,
                CoreError::NodeNotFound(node_id.to_string()),
            ));
        }
        session.navigate_to(node_id, now)
    }

    async fn load(&self, session_id: &SessionId) -> Result<Session, CoreError> {
        self.session_repo
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))
    }

    /// The graph version a session started on
    async fn graph_for(&self, session: &Session) -> Result<Arc<FlowGraph>, CoreError> {
        match self
            .flow_repo
            .find_version(&session.flow_id, session.flow_version)
            .await?
        {
            Some(graph) => Ok(graph),
            None => Err(self.structural(
                session,
                CoreError::FlowNotFound(format!(
                    "{} (version {})",
                    session.flow_id, session.flow_version
                )),
            )),
        }
    }

    fn node_at<'g>(
        &self,
        graph: &'g FlowGraph,
        session: &Session,
        node_id: &NodeId,
    ) -> Result<&'g Node, CoreError> {
        graph
            .node(node_id.as_str())
            .ok_or_else(|| self.structural(session, CoreError::NodeNotFound(node_id.to_string())))
    }

    /// Log an inconsistency a published flow should never produce
    fn structural(&self, session: &Session, err: CoreError) -> CoreError {
        error!(
            session_id = %session.id,
            flow_id = %session.flow_id,
            flow_version = session.flow_version,
            node_id = %session.current_node_id,
            error = %err,
            "Fatal flow inconsistency"
        );
        err
    }

    /// Run handlers from `node` until the session reaches an interactive
    /// node, terminates or fails. Works on a copy of the variables.
    async fn run_chain(
        &self,
        graph: &FlowGraph,
        session: &Session,
        node: &Node,
        input: &str,
    ) -> Result<Transition, CoreError> {
        let mut variables = session.variables.clone();
        let mut hops = Vec::new();
        let mut node = node;
        let mut input = input;
        let mut automatic = 0u32;
        let mut committed = false;

        let end = loop {
            let ctx = HandlerContext {
                session_id: &session.id,
                flow_id: &session.flow_id,
                phone_number: &session.phone_number,
                variables: &variables,
            };
            let result = self.handlers.dispatch(node, &ctx, input).await;
            variables.extend(result.updates);

            let next_id = match result.outcome {
                NavigationOutcome::Next(next_id) => {
                    if matches!(node.kind, NodeKind::Payment(_) | NodeKind::Api(_)) {
                        committed = true;
                    }
                    next_id
                }
                NavigationOutcome::Terminate => break ChainEnd::Terminate,
                NavigationOutcome::Error(message) => break ChainEnd::Error(message),
            };

            let next = self.node_at(graph, session, &next_id)?;
            hops.push(next_id);

            if next.kind.is_interactive() {
                break ChainEnd::Rest;
            }

            automatic += 1;
            if automatic > self.config.max_auto_transitions {
                warn!(
                    session_id = %session.id,
                    node_id = %next.id,
                    limit = self.config.max_auto_transitions,
                    "Automatic transition limit reached"
                );
                break ChainEnd::Error(AUTO_TRANSITION_LIMIT_MESSAGE.to_string());
            }

            node = next;
            input = "";
        };

        Ok(Transition {
            hops,
            variables,
            end,
            committed,
        })
    }

    /// Apply a transition in full. An error leaves position and variables
    /// untouched, unless an external action already ran, in which case the
    /// session moves to the node that failed and the error is reported there.
    fn apply(
        &self,
        graph: &FlowGraph,
        session: &mut Session,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<NavigationResult, CoreError> {
        let Transition {
            hops,
            variables,
            end,
            committed,
        } = transition;

        if committed || !matches!(end, ChainEnd::Error(_)) {
            session.merge_variables(variables);
            for hop in hops {
                self.navigate_to(graph, session, hop, now)?;
            }
        }

        if let ChainEnd::Error(message) = &end {
            debug!(
                session_id = %session.id,
                node_id = %session.current_node_id,
                error = %message,
                "Re-prompting after recoverable error"
            );
            session.record_error(message, now);
            let node = self.node_at(graph, session, &session.current_node_id)?;
            return Ok(NavigationResult {
                session_id: session.id.clone(),
                current_node_id: session.current_node_id.clone(),
                prompt: render_error(message, node, &session.variables),
                terminated: false,
                error: Some(message.clone()),
                status: session.status,
            });
        }

        let node = self.node_at(graph, session, &session.current_node_id)?;
        let (prompt, terminated) = match end {
            ChainEnd::Rest => (render_node(node, &session.variables), false),
            _ => {
                let prompt = match (&node.kind, &node.text) {
                    (NodeKind::End, Some(_)) => render_node(node, &session.variables),
                    _ => self.config.goodbye_message.clone(),
                };
                session.complete(now)?;
                info!(
                    session_id = %session.id,
                    flow_id = %session.flow_id,
                    steps = session.step_count,
                    "Session completed"
                );
                (prompt, true)
            }
        };

        Ok(NavigationResult {
            session_id: session.id.clone(),
            current_node_id: session.current_node_id.clone(),
            prompt,
            terminated,
            error: None,
            status: session.status,
        })
    }

    async fn record_usage(&self, session: &Session) {
        if let Err(err) = self.usage.record_completion(&session.flow_id).await {
            warn!(flow_id = %session.flow_id, error = %err, "Failed to record flow usage");
        }
    }

    /// Publish pending events. Sink failures never fail the operation.
    async fn handle_events(&self, session: &mut Session) {
        for event in session.take_events() {
            let event_type = event.event_type();
            if let Err(err) = self.event_handler.handle_event(event).await {
                warn!(session_id = %session.id, event_type, error = %err, "Event handler failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Probe {
        session_id: SessionId,
        flow_id: FlowId,
    }

    impl DomainEvent for Probe {
        fn event_type(&self) -> &'static str {
            "probe"
        }
        fn session_id(&self) -> &SessionId {
            &self.session_id
        }
        fn flow_id(&self) -> &FlowId {
            &self.flow_id
        }
        fn node_id(&self) -> Option<&NodeId> {
            None
        }
        fn timestamp(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    #[derive(Default)]
    struct Collect {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl DomainEventHandler for Collect {
        async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", event.event_type(), event.session_id()));
            if self.fail {
                return Err(CoreError::Other("sink down".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_composite_forwards_to_all() {
        let failing = Arc::new(Collect {
            fail: true,
            ..Default::default()
        });
        let healthy = Arc::new(Collect::default());
        let composite = CompositeEventHandler::new(vec![failing.clone(), healthy.clone()]);

        let result = composite
            .handle_event(Box::new(Probe {
                session_id: SessionId("s-9".to_string()),
                flow_id: FlowId::from("f"),
            }))
            .await;

        assert!(result.is_err());
        assert_eq!(*failing.seen.lock().unwrap(), vec!["probe:s-9".to_string()]);
        assert_eq!(*healthy.seen.lock().unwrap(), vec!["probe:s-9".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_composite_is_ok() {
        let composite = CompositeEventHandler::new(Vec::new());
        let result = composite
            .handle_event(Box::new(Probe {
                session_id: SessionId("s".to_string()),
                flow_id: FlowId::from("f"),
            }))
            .await;
        assert!(result.is_ok());
    }
}
