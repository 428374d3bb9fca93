use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fmt::Debug;
use ussd_dsl::{FlowId, NodeId};

use crate::domain::session::SessionId;

/// Domain event trait for all session events
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the session this event is associated with
    fn session_id(&self) -> &SessionId;

    /// Returns the flow the session runs
    fn flow_id(&self) -> &FlowId;

    /// Node the event happened at, where applicable
    fn node_id(&self) -> Option<&NodeId>;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;

    /// Event-specific attributes for analytics sinks
    fn attributes(&self) -> Value {
        Value::Null
    }

    /// Full event as a JSON object
    fn to_json(&self) -> Value {
        json!({
            "event": self.event_type(),
            "sessionId": self.session_id().0,
            "flowId": self.flow_id().0,
            "nodeId": self.node_id().map(|n| n.0.clone()),
            "timestamp": self.timestamp().to_rfc3339(),
            "attributes": self.attributes(),
        })
    }
}

/// Event: session started
#[derive(Debug)]
pub struct SessionStarted {
    pub session_id: SessionId,
    pub flow_id: FlowId,
    pub flow_version: u32,
    /// Start node
    pub node_id: NodeId,
    pub phone_number: String,
    pub ussd_code: String,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for SessionStarted {
    fn event_type(&self) -> &'static str {
        "session_started"
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    fn node_id(&self) -> Option<&NodeId> {
        Some(&self.node_id)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Value {
        json!({
            "flowVersion": self.flow_version,
            "phoneNumber": self.phone_number,
            "ussdCode": self.ussd_code,
        })
    }
}

/// Event: session moved to a node
#[derive(Debug)]
pub struct NodeVisited {
    pub session_id: SessionId,
    pub flow_id: FlowId,
    /// Node arrived at
    pub node_id: NodeId,
    /// Node left
    pub from_node_id: NodeId,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for NodeVisited {
    fn event_type(&self) -> &'static str {
        "node_visited"
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    fn node_id(&self) -> Option<&NodeId> {
        Some(&self.node_id)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Value {
        json!({ "fromNodeId": self.from_node_id.0 })
    }
}

/// Event: user input recorded
#[derive(Debug)]
pub struct InputReceived {
    pub session_id: SessionId,
    pub flow_id: FlowId,
    pub node_id: NodeId,
    pub input: String,
    pub step_index: u32,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for InputReceived {
    fn event_type(&self) -> &'static str {
        "input_received"
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    fn node_id(&self) -> Option<&NodeId> {
        Some(&self.node_id)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Value {
        json!({ "input": self.input, "stepIndex": self.step_index })
    }
}

/// Event: recoverable error, the user is re-prompted
#[derive(Debug)]
pub struct ErrorOccurred {
    pub session_id: SessionId,
    pub flow_id: FlowId,
    pub node_id: NodeId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ErrorOccurred {
    fn event_type(&self) -> &'static str {
        "error_occurred"
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    fn node_id(&self) -> Option<&NodeId> {
        Some(&self.node_id)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Value {
        json!({ "message": self.message })
    }
}

/// Event: session finished normally
#[derive(Debug)]
pub struct SessionCompleted {
    pub session_id: SessionId,
    pub flow_id: FlowId,
    pub node_id: NodeId,
    pub step_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for SessionCompleted {
    fn event_type(&self) -> &'static str {
        "session_completed"
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    fn node_id(&self) -> Option<&NodeId> {
        Some(&self.node_id)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Value {
        json!({ "stepCount": self.step_count })
    }
}

/// Event: session cancelled by the user or by policy
#[derive(Debug)]
pub struct SessionTerminated {
    pub session_id: SessionId,
    pub flow_id: FlowId,
    pub node_id: NodeId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for SessionTerminated {
    fn event_type(&self) -> &'static str {
        "session_terminated"
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    fn node_id(&self) -> Option<&NodeId> {
        Some(&self.node_id)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Value {
        json!({ "reason": self.reason })
    }
}

/// Event: session lapsed through inactivity
#[derive(Debug)]
pub struct SessionExpired {
    pub session_id: SessionId,
    pub flow_id: FlowId,
    pub node_id: NodeId,
    /// Time since the last user activity
    pub idle_secs: i64,
    /// Time since the session started
    pub duration_secs: i64,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for SessionExpired {
    fn event_type(&self) -> &'static str {
        "session_expired"
    }

    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    fn node_id(&self) -> Option<&NodeId> {
        Some(&self.node_id)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Value {
        json!({ "idleSecs": self.idle_secs, "durationSecs": self.duration_secs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let now = Utc::now();
        let event = ErrorOccurred {
            session_id: SessionId("s-1".to_string()),
            flow_id: FlowId("f-1".to_string()),
            node_id: NodeId("menu".to_string()),
            message: "Invalid option selected".to_string(),
            timestamp: now,
        };

        let json = event.to_json();
        assert_eq!(json["event"], "error_occurred");
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["flowId"], "f-1");
        assert_eq!(json["nodeId"], "menu");
        assert_eq!(json["attributes"]["message"], "Invalid option selected");
        assert_eq!(json["timestamp"], now.to_rfc3339());
    }
}
