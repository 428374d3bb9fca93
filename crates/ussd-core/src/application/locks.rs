use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ussd_dsl::FlowId;

use crate::domain::session::SessionId;

/// Per-key exclusive sections.
///
/// Every mutation of a session happens while holding the section for its id,
/// so a retried request, a terminate call and the expiry sweeper never
/// interleave on the same session. Session creation takes a section keyed by
/// the (flow, phone, code) triple so two first requests cannot both create.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the section guarding `session_id`
    pub async fn lock_session(&self, session_id: &SessionId) -> SectionGuard<'_> {
        self.lock(session_id.0.clone()).await
    }

    /// Wait for the section guarding session creation for a triple
    pub async fn lock_creation(
        &self,
        flow_id: &FlowId,
        phone_number: &str,
        ussd_code: &str,
    ) -> SectionGuard<'_> {
        self.lock(creation_key(flow_id, phone_number, ussd_code))
            .await
    }

    async fn lock(&self, key: String) -> SectionGuard<'_> {
        // Clone the Arc out so the map shard is not held across the await
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        SectionGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Drop the entry for `key` unless someone else holds or awaits it
    fn release(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds one exclusive section. Dropping it unlocks the section and removes
/// the map entry when no other task is waiting for the same key.
pub struct SectionGuard<'a> {
    locks: &'a SessionLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so our own Arc no longer counts
        drop(self.guard.take());
        self.locks.release(&self.key);
    }
}

fn creation_key(flow_id: &FlowId, phone_number: &str, ussd_code: &str) -> String {
    format!("create:{}:{}:{}", flow_id, phone_number, ussd_code)
}
