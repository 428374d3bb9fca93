use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;
use ussd_dsl::{FlowGraph, FlowId, NodeId};

use crate::domain::events::{
    DomainEvent, ErrorOccurred, InputReceived, NodeVisited, SessionCompleted, SessionExpired,
    SessionStarted, SessionTerminated,
};
use crate::CoreError;

/// Value object: Session ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        SessionId(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session status. Every state other than `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Accepting input
    Active,

    /// Finished normally
    Completed,

    /// Cancelled by the user or by policy
    Terminated,

    /// Lapsed through inactivity
    Expired,
}

/// One accepted input, kept for audit and analytics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    pub input: String,
    pub step_index: u32,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate: one live walk of a phone number through a flow
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub flow_id: FlowId,

    /// Graph version the session was started on
    pub flow_version: u32,

    pub phone_number: String,
    pub ussd_code: String,
    pub status: SessionStatus,
    pub current_node_id: NodeId,

    /// Captured values by variable name
    pub variables: HashMap<String, String>,

    /// Append-only
    pub input_history: Vec<InputRecord>,

    pub step_count: u32,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub termination_reason: Option<String>,

    /// Domain events
    #[serde(skip)]
    events: Vec<Box<dyn DomainEvent>>,
}

// Domain events are not cloned
impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            flow_id: self.flow_id.clone(),
            flow_version: self.flow_version,
            phone_number: self.phone_number.clone(),
            ussd_code: self.ussd_code.clone(),
            status: self.status,
            current_node_id: self.current_node_id.clone(),
            variables: self.variables.clone(),
            input_history: self.input_history.clone(),
            step_count: self.step_count,
            started_at: self.started_at,
            last_activity_at: self.last_activity_at,
            expires_at: self.expires_at,
            completed_at: self.completed_at,
            termination_reason: self.termination_reason.clone(),
            events: Vec::new(),
        }
    }
}

impl Session {
    /// Start a session at the graph's start node
    pub fn new(
        graph: &FlowGraph,
        phone_number: &str,
        ussd_code: &str,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let mut session = Self {
            id: SessionId::generate(),
            flow_id: graph.id.clone(),
            flow_version: graph.version,
            phone_number: phone_number.to_string(),
            ussd_code: ussd_code.to_string(),
            status: SessionStatus::Active,
            current_node_id: graph.start_node_id.clone(),
            variables: HashMap::new(),
            input_history: Vec::new(),
            step_count: 0,
            started_at: now,
            last_activity_at: now,
            expires_at: now + timeout,
            completed_at: None,
            termination_reason: None,
            events: Vec::with_capacity(4),
        };

        session.record_event(Box::new(SessionStarted {
            session_id: session.id.clone(),
            flow_id: session.flow_id.clone(),
            flow_version: session.flow_version,
            node_id: session.current_node_id.clone(),
            phone_number: session.phone_number.clone(),
            ussd_code: session.ussd_code.clone(),
            timestamp: now,
        }));

        session
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Active but past its expiry time
    #[inline]
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at < now
    }

    fn ensure_active(&self, action: &str) -> Result<(), CoreError> {
        if self.status != SessionStatus::Active {
            return Err(CoreError::InvalidState(format!(
                "Cannot {} in state: {:?}",
                action, self.status
            )));
        }
        Ok(())
    }

    /// Record an input attempt and renew the expiry window
    pub(crate) fn record_input(
        &mut self,
        input: &str,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.ensure_active("process input")?;

        self.step_count += 1;
        self.input_history.push(InputRecord {
            input: input.to_string(),
            step_index: self.step_count,
            timestamp: now,
        });
        self.last_activity_at = now;
        self.expires_at = now + timeout;

        self.record_event(Box::new(InputReceived {
            session_id: self.id.clone(),
            flow_id: self.flow_id.clone(),
            node_id: self.current_node_id.clone(),
            input: input.to_string(),
            step_index: self.step_count,
            timestamp: now,
        }));

        Ok(())
    }

    /// Move to another node. The caller checks the node exists in the graph.
    pub(crate) fn navigate_to(&mut self, node_id: NodeId, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_active("navigate")?;

        let from = std::mem::replace(&mut self.current_node_id, node_id);
        self.record_event(Box::new(NodeVisited {
            session_id: self.id.clone(),
            flow_id: self.flow_id.clone(),
            node_id: self.current_node_id.clone(),
            from_node_id: from,
            timestamp: now,
        }));

        Ok(())
    }

    /// Note a recoverable error at the current node
    pub(crate) fn record_error(&mut self, message: &str, now: DateTime<Utc>) {
        self.record_event(Box::new(ErrorOccurred {
            session_id: self.id.clone(),
            flow_id: self.flow_id.clone(),
            node_id: self.current_node_id.clone(),
            message: message.to_string(),
            timestamp: now,
        }));
    }

    pub(crate) fn merge_variables(&mut self, updates: HashMap<String, String>) {
        self.variables.extend(updates);
    }

    /// Finish the session normally
    pub(crate) fn complete(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_active("complete session")?;

        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);

        self.record_event(Box::new(SessionCompleted {
            session_id: self.id.clone(),
            flow_id: self.flow_id.clone(),
            node_id: self.current_node_id.clone(),
            step_count: self.step_count,
            timestamp: now,
        }));

        Ok(())
    }

    /// Cancel the session
    pub(crate) fn terminate(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_active("terminate session")?;

        self.status = SessionStatus::Terminated;
        self.termination_reason = Some(reason.to_string());
        self.last_activity_at = now;

        self.record_event(Box::new(SessionTerminated {
            session_id: self.id.clone(),
            flow_id: self.flow_id.clone(),
            node_id: self.current_node_id.clone(),
            reason: reason.to_string(),
            timestamp: now,
        }));

        Ok(())
    }

    /// Move a lapsed session to `Expired`
    pub(crate) fn expire(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.ensure_active("expire session")?;

        let idle = now - self.last_activity_at;
        let duration = now - self.started_at;

        self.status = SessionStatus::Expired;
        self.last_activity_at = now;

        self.record_event(Box::new(SessionExpired {
            session_id: self.id.clone(),
            flow_id: self.flow_id.clone(),
            node_id: self.current_node_id.clone(),
            idle_secs: idle.num_seconds(),
            duration_secs: duration.num_seconds(),
            timestamp: now,
        }));

        Ok(())
    }

    /// Record a domain event
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Get and clear all domain events
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }
}
