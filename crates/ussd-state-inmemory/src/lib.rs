//! In-memory state store for the USSD flow engine
//!
//! This crate provides in-memory implementations of the repository traits
//! defined in ussd-core, plus in-memory event and action collaborators. It
//! is primarily useful for development, testing and the simulator, where
//! persistence is not required.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod repositories;
pub use repositories::{InMemoryFlowRepository, InMemorySessionRepository, InMemoryUsageCounter};

pub mod collaborators;
pub use collaborators::{RecordingEventHandler, ScriptedActionExecutor};

use ussd_core::{
    DomainEventHandler, EngineConfig, ExternalActionExecutor, FlowRegistry, FlowRepository,
    RuntimeInterface, Session, SessionEngine, SessionRepository, UsageRecorder,
};

/// Provider for in-memory repositories
pub struct InMemoryStateStoreProvider {
    // Shared storage for sessions
    sessions: Arc<RwLock<HashMap<String, Session>>>,

    flows: Arc<InMemoryFlowRepository>,
    usage: Arc<InMemoryUsageCounter>,
}

impl InMemoryStateStoreProvider {
    /// Create a new in-memory state store provider
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            flows: Arc::new(InMemoryFlowRepository::new()),
            usage: Arc::new(InMemoryUsageCounter::new()),
        }
    }

    /// Create repositories for use with the session engine
    pub fn create_repositories(
        &self,
    ) -> (
        Arc<dyn SessionRepository>,
        Arc<dyn FlowRepository>,
        Arc<dyn UsageRecorder>,
    ) {
        (
            self.session_repository(),
            self.flows.clone(),
            self.usage.clone(),
        )
    }

    /// A repository view over the shared session storage
    pub fn session_repository(&self) -> Arc<InMemorySessionRepository> {
        Arc::new(InMemorySessionRepository::new(self.sessions.clone()))
    }

    pub fn flow_repository(&self) -> Arc<InMemoryFlowRepository> {
        self.flows.clone()
    }

    /// Completed-session counter shared with every engine built here
    pub fn usage_counter(&self) -> Arc<InMemoryUsageCounter> {
        self.usage.clone()
    }

    /// Build an engine over this provider's storage
    pub fn engine(
        &self,
        executor: Arc<dyn ExternalActionExecutor>,
        event_handler: Arc<dyn DomainEventHandler>,
        config: EngineConfig,
    ) -> SessionEngine {
        let (sessions, flows, usage) = self.create_repositories();
        SessionEngine::new(sessions, flows, usage, executor, event_handler, config)
    }

    /// Build a runtime interface over this provider's storage
    pub fn runtime(
        &self,
        executor: Arc<dyn ExternalActionExecutor>,
        event_handler: Arc<dyn DomainEventHandler>,
        config: EngineConfig,
    ) -> RuntimeInterface {
        let engine = Arc::new(self.engine(executor, event_handler, config));
        let registry = Arc::new(FlowRegistry::new(self.flows.clone()));
        RuntimeInterface::new(engine, registry)
    }
}

impl Default for InMemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}
