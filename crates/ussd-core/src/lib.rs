//!
//! USSD Core - session runtime for USSD flows
//!
//! This crate drives live phone sessions through published flow graphs:
//! the session aggregate and its events, the node type handlers, the
//! session state machine, the expiry sweeper and the repository traits
//! storage crates implement.

#![forbid(unsafe_code)]

/// Domain layer - session aggregate, events and repository traits
pub mod domain;

/// Application services - state machine, handlers and publishing
pub mod application;

/// Engine configuration
pub mod config;

/// Error types
pub mod error;

pub use error::CoreError;

pub use config::EngineConfig;

pub use domain::events::{
    DomainEvent, ErrorOccurred, InputReceived, NodeVisited, SessionCompleted, SessionExpired,
    SessionStarted, SessionTerminated,
};
pub use domain::repository::{FlowRepository, SessionRepository, UsageRecorder};
pub use domain::session::{InputRecord, Session, SessionId, SessionStatus};

pub use application::expiry_sweeper::{ExpirySweeper, SweepReport, SweeperHandle};
pub use application::flow_registry::FlowRegistry;
pub use application::handlers::{
    ActionKind, ActionRequest, ActionResult, ConditionEvaluator, DefaultConditionEvaluator,
    ExternalActionExecutor, NavigationOutcome, NodeHandlers, NodeResult,
};
pub use application::runtime_interface::{
    FlowValidationReport, InputResponse, RuntimeInterface, SessionCreated,
};
pub use application::session_engine::{
    CompositeEventHandler, DomainEventHandler, NavigationResult, NoopEventHandler, SessionEngine,
    SessionStart,
};

/// Returns the version of the USSD core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
