//! Repository traits for the USSD core
//!
//! Persistence of sessions and published flows lives outside this crate.
//! External crates implement these traits to provide different storage
//! mechanisms.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use ussd_dsl::{FlowGraph, FlowId};

use super::session::{Session, SessionId};
use crate::CoreError;

/// Repository for sessions
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Find a session by ID
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, CoreError>;

    /// Save a session, replacing any previous state
    async fn save(&self, session: &Session) -> Result<(), CoreError>;

    /// Delete a session
    async fn delete(&self, id: &SessionId) -> Result<(), CoreError>;

    /// The Active session for a (flow, phone, code) triple, if any
    async fn find_active(
        &self,
        flow_id: &FlowId,
        phone_number: &str,
        ussd_code: &str,
    ) -> Result<Option<Session>, CoreError>;

    /// Ids of Active sessions whose `expires_at` is before `now`
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<SessionId>, CoreError>;
}

/// Repository for published flow graphs.
///
/// Each published version is kept so that sessions finish on the version
/// they started with.
#[async_trait]
pub trait FlowRepository: Send + Sync {
    /// The version new sessions start on
    async fn find_current(&self, flow_id: &FlowId) -> Result<Option<Arc<FlowGraph>>, CoreError>;

    /// A specific published version
    async fn find_version(
        &self,
        flow_id: &FlowId,
        version: u32,
    ) -> Result<Option<Arc<FlowGraph>>, CoreError>;

    /// Store a graph under its version and make it current in one step
    async fn publish(&self, graph: Arc<FlowGraph>) -> Result<(), CoreError>;

    /// Highest published version, if any
    async fn latest_version(&self, flow_id: &FlowId) -> Result<Option<u32>, CoreError>;

    /// Remove a flow from service. Published versions stay readable for
    /// sessions already running on them.
    async fn unpublish(&self, flow_id: &FlowId) -> Result<(), CoreError>;

    /// Ids of flows with a current version
    async fn list_flows(&self) -> Result<Vec<FlowId>, CoreError>;
}

/// Flow usage counter, incremented once per completed session
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record_completion(&self, flow_id: &FlowId) -> Result<(), CoreError>;
}
