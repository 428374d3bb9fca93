//! Analytics sink that turns session events into structured log lines and
//! counters.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::{info, warn};
use ussd_core::{CoreError, DomainEvent, DomainEventHandler};

use crate::metrics::SessionMetrics;
use crate::MonitoringConfig;

/// Per event type counts observed by a [`TracingEventHandler`]
#[derive(Debug, Default)]
pub struct EventCounters {
    counts: DashMap<&'static str, u64>,
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, event_type: &'static str) {
        *self.counts.entry(event_type).or_insert(0) += 1;
    }

    pub fn get(&self, event_type: &str) -> u64 {
        self.counts.get(event_type).map(|c| *c).unwrap_or(0)
    }

    /// Sorted copy of all counts
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.counts.iter().map(|e| (*e.key(), *e.value())).collect()
    }
}

/// Event handler that logs every session event through `tracing`
pub struct TracingEventHandler {
    counters: EventCounters,
    emit_metrics: bool,
}

impl TracingEventHandler {
    pub fn new(config: &MonitoringConfig) -> Self {
        if config.enable_metrics {
            SessionMetrics::describe();
        }
        Self {
            counters: EventCounters::new(),
            emit_metrics: config.enable_metrics,
        }
    }

    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }
}

#[async_trait]
impl DomainEventHandler for TracingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        let event_type = event.event_type();
        let node_id = event.node_id().map(|n| n.0.as_str()).unwrap_or("-");

        match event_type {
            "error_occurred" => warn!(
                event = event_type,
                session_id = %event.session_id().0,
                flow_id = %event.flow_id().0,
                node_id,
                attributes = %event.attributes(),
                "Session event"
            ),
            _ => info!(
                event = event_type,
                session_id = %event.session_id().0,
                flow_id = %event.flow_id().0,
                node_id,
                timestamp = %event.timestamp().to_rfc3339(),
                attributes = %event.attributes(),
                "Session event"
            ),
        }

        self.counters.increment(event_type);
        if self.emit_metrics {
            SessionMetrics::record_event(event_type, &event.flow_id().0);
        }

        Ok(())
    }
}
