use thiserror::Error;

/// Core error type for the USSD runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Flow is not published
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    /// A node referenced at runtime does not exist in the session's graph
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The session is not in a state that allows the operation
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// The flow graph failed validation and cannot be published
    #[error("Flow validation failed: {0}")]
    FlowValidation(String),

    /// External action executor failure
    #[error("External action error: {0}")]
    ExternalAction(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Malformed or unpublished flow. A published flow must never produce
    /// these at runtime, so they are logged as fatal inconsistencies.
    pub fn is_structural(&self) -> bool {
        matches!(self, CoreError::FlowNotFound(_) | CoreError::NodeNotFound(_))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl From<ussd_dsl::DslError> for CoreError {
    fn from(err: ussd_dsl::DslError) -> Self {
        CoreError::FlowValidation(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
