use std::sync::Arc;

use ussd_core::{CompositeEventHandler, CoreError, DomainEventHandler, EngineConfig};
use ussd_dsl::parse_flow_definition;
use ussd_monitoring::{MonitoringConfig, TracingEventHandler};
use ussd_state_inmemory::{InMemoryStateStoreProvider, RecordingEventHandler, ScriptedActionExecutor};

const FLOW: &str = r#"{
    "id": "bank",
    "startNodeId": "start",
    "nodes": {
        "start": {
            "kind": "menu",
            "text": "Welcome",
            "options": [
                {"key": "1", "text": "Check balance", "targetNodeId": "bal"},
                {"key": "0", "text": "Exit", "targetNodeId": null}
            ]
        },
        "bal": {"kind": "end", "text": "Your balance is KES 100"}
    }
}"#;

#[tokio::test]
async fn test_session_events_reach_tracing_sink() -> Result<(), CoreError> {
    let tracing_sink = Arc::new(TracingEventHandler::new(&MonitoringConfig::default()));
    let recorder = Arc::new(RecordingEventHandler::new());
    let sinks: Vec<Arc<dyn DomainEventHandler>> = vec![tracing_sink.clone(), recorder.clone()];

    let provider = InMemoryStateStoreProvider::new();
    let runtime = provider.runtime(
        Arc::new(ScriptedActionExecutor::new()),
        Arc::new(CompositeEventHandler::new(sinks)),
        EngineConfig::default(),
    );
    runtime.publish_flow(parse_flow_definition(FLOW)?).await?;

    let created = runtime.create_session("bank", "+254700000001", "*123#").await?;
    let session_id = created.session_id.0.clone();
    runtime.process_input(&session_id, "9").await?;
    runtime.process_input(&session_id, "1").await?;
    let last = runtime.process_input(&session_id, "").await?;
    assert!(last.terminated);

    let counters = tracing_sink.counters();
    assert_eq!(counters.get("session_started"), 1);
    assert_eq!(counters.get("input_received"), 3);
    assert_eq!(counters.get("error_occurred"), 1);
    assert_eq!(counters.get("node_visited"), 1);
    assert_eq!(counters.get("session_completed"), 1);

    // Both sinks saw the same stream
    let total: u64 = counters.snapshot().values().sum();
    assert_eq!(total as usize, recorder.events().await.len());
    Ok(())
}
