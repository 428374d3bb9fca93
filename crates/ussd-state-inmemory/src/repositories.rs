use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use ussd_core::{
    CoreError, FlowRepository, Session, SessionId, SessionRepository, UsageRecorder,
};
use ussd_dsl::{FlowGraph, FlowId};

/// In-memory implementation of the SessionRepository
pub struct InMemorySessionRepository {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionRepository {
    /// Create a new in-memory session repository
    pub fn new(sessions: Arc<RwLock<HashMap<String, Session>>>) -> Self {
        Self { sessions }
    }

    /// Number of stored sessions in any state
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, CoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id.0).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), CoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.0.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), CoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id.0);
        Ok(())
    }

    async fn find_active(
        &self,
        flow_id: &FlowId,
        phone_number: &str,
        ussd_code: &str,
    ) -> Result<Option<Session>, CoreError> {
        let sessions = self.sessions.read().await;

        // Newest first if a store ever holds more than one
        let found = sessions
            .values()
            .filter(|session| {
                session.is_active()
                    && session.flow_id == *flow_id
                    && session.phone_number == phone_number
                    && session.ussd_code == ussd_code
            })
            .max_by_key(|session| session.started_at)
            .cloned();

        Ok(found)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<SessionId>, CoreError> {
        let sessions = self.sessions.read().await;

        let mut expired: Vec<&Session> = sessions
            .values()
            .filter(|session| session.is_lapsed(now))
            .collect();
        expired.sort_by_key(|session| session.expires_at);

        Ok(expired.into_iter().map(|session| session.id.clone()).collect())
    }
}

/// Every published version of one flow
#[derive(Default)]
struct FlowEntry {
    versions: BTreeMap<u32, Arc<FlowGraph>>,
    current: Option<u32>,
}

/// In-memory implementation of the FlowRepository
pub struct InMemoryFlowRepository {
    flows: Arc<RwLock<HashMap<String, FlowEntry>>>,
}

impl InMemoryFlowRepository {
    /// Create an empty flow repository
    pub fn new() -> Self {
        Self {
            flows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryFlowRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowRepository for InMemoryFlowRepository {
    async fn find_current(&self, flow_id: &FlowId) -> Result<Option<Arc<FlowGraph>>, CoreError> {
        let flows = self.flows.read().await;
        Ok(flows.get(&flow_id.0).and_then(|entry| {
            entry
                .current
                .and_then(|version| entry.versions.get(&version).cloned())
        }))
    }

    async fn find_version(
        &self,
        flow_id: &FlowId,
        version: u32,
    ) -> Result<Option<Arc<FlowGraph>>, CoreError> {
        let flows = self.flows.read().await;
        Ok(flows
            .get(&flow_id.0)
            .and_then(|entry| entry.versions.get(&version).cloned()))
    }

    async fn publish(&self, graph: Arc<FlowGraph>) -> Result<(), CoreError> {
        let mut flows = self.flows.write().await;
        let entry = flows.entry(graph.id.0.clone()).or_default();

        if entry.versions.contains_key(&graph.version) {
            return Err(CoreError::StateStore(format!(
                "Flow {} version {} is already published",
                graph.id, graph.version
            )));
        }

        debug!(flow_id = %graph.id, version = graph.version, "Storing flow version");
        entry.current = Some(graph.version);
        entry.versions.insert(graph.version, graph);
        Ok(())
    }

    async fn latest_version(&self, flow_id: &FlowId) -> Result<Option<u32>, CoreError> {
        let flows = self.flows.read().await;
        Ok(flows
            .get(&flow_id.0)
            .and_then(|entry| entry.versions.keys().next_back().copied()))
    }

    async fn unpublish(&self, flow_id: &FlowId) -> Result<(), CoreError> {
        let mut flows = self.flows.write().await;
        match flows.get_mut(&flow_id.0) {
            Some(entry) => {
                entry.current = None;
                Ok(())
            }
            None => Err(CoreError::FlowNotFound(flow_id.to_string())),
        }
    }

    async fn list_flows(&self) -> Result<Vec<FlowId>, CoreError> {
        let flows = self.flows.read().await;
        let mut ids: Vec<FlowId> = flows
            .iter()
            .filter(|(_, entry)| entry.current.is_some())
            .map(|(id, _)| FlowId(id.clone()))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Counts completed sessions per flow
pub struct InMemoryUsageCounter {
    counts: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemoryUsageCounter {
    pub fn new() -> Self {
        Self {
            counts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Completed sessions recorded for a flow
    pub async fn count(&self, flow_id: &FlowId) -> u64 {
        self.counts
            .read()
            .await
            .get(&flow_id.0)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for InMemoryUsageCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageRecorder for InMemoryUsageCounter {
    async fn record_completion(&self, flow_id: &FlowId) -> Result<(), CoreError> {
        let mut counts = self.counts.write().await;
        *counts.entry(flow_id.0.clone()).or_insert(0) += 1;
        Ok(())
    }
}
