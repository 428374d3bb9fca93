//! Session counters exported through the `metrics` facade.
//!
//! Nothing is recorded unless the host application installs a recorder.

use once_cell::sync::OnceCell;

/// Counter incremented once per session event
pub const SESSION_EVENTS_TOTAL: &str = "ussd_session_events_total";

/// Counter incremented once per completed session
pub const SESSIONS_COMPLETED_TOTAL: &str = "ussd_sessions_completed_total";

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// USSD session metrics
pub struct SessionMetrics;

impl SessionMetrics {
    /// Register metric descriptions with the installed recorder. Idempotent.
    pub fn describe() {
        DESCRIBED.get_or_init(|| {
            ::metrics::describe_counter!(
                SESSION_EVENTS_TOTAL,
                "Session events emitted by the flow engine, by event type and flow"
            );
            ::metrics::describe_counter!(
                SESSIONS_COMPLETED_TOTAL,
                "Sessions that reached the end of their flow"
            );
        });
    }

    /// Record one session event
    pub fn record_event(event_type: &'static str, flow_id: &str) {
        ::metrics::increment_counter!(
            SESSION_EVENTS_TOTAL,
            "event" => event_type,
            "flow_id" => flow_id.to_string()
        );
        if event_type == "session_completed" {
            ::metrics::increment_counter!(
                SESSIONS_COMPLETED_TOTAL,
                "flow_id" => flow_id.to_string()
            );
        }
    }
}
