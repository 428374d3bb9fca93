/// Node type handlers
pub mod handlers;

/// Per-session exclusive sections
pub mod locks;

/// Prompt rendering and variable interpolation
pub mod prompt;

/// Session state machine
pub mod session_engine;

/// Flow validation and publishing
pub mod flow_registry;

/// Background expiry of idle sessions
pub mod expiry_sweeper;

/// Runtime interface for external systems
pub mod runtime_interface;
