//! `ussd-sim`: validate flow definitions and walk through them from a terminal.
//!
//! Usage:
//!   ussd-sim validate flows/bank.json
//!   ussd-sim simulate flows/bank.yaml --phone +254700000001 --code "*123#"

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use ussd_core::{EngineConfig, ExpirySweeper, FlowRegistry, RuntimeInterface};
use ussd_dsl::{FlowGraph, Severity};
use ussd_monitoring::{MonitoringConfig, TracingEventHandler};
use ussd_state_inmemory::{InMemoryStateStoreProvider, ScriptedActionExecutor};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a flow definition for structural errors and warnings
    Validate {
        /// Flow file (.json, .yaml or .yml)
        path: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a session against a flow, reading user input from stdin
    Simulate {
        /// Flow file (.json, .yaml or .yml)
        path: PathBuf,

        #[arg(long, default_value = "+254700000000")]
        phone: String,

        #[arg(long, default_value = "*123#")]
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let monitoring_config = MonitoringConfig {
        service_name: "ussd-sim".to_string(),
        log_filter: std::env::var("USSD_LOG_FILTER").unwrap_or_else(|_| "warn".to_string()),
        ..MonitoringConfig::from_env()
    };
    ussd_monitoring::init_logging(&monitoring_config)
        .context("Failed to initialize logging")?;

    match cli.command {
        Commands::Validate { path, json } => validate(&path, json),
        Commands::Simulate { path, phone, code } => {
            simulate(&path, &phone, &code, &monitoring_config).await
        }
    }
}

/// Parse a flow file, choosing the format from its extension
fn load_flow(path: &Path) -> Result<FlowGraph> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("flow")
        .to_string();

    let graph = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => ussd_dsl::parse_flow_definition_yaml_with_id(&stem, &source),
        _ => ussd_dsl::parse_flow_definition_with_id(&stem, &source),
    };

    graph.with_context(|| format!("Failed to parse {}", path.display()))
}

fn validate(path: &Path, json: bool) -> Result<()> {
    let graph = load_flow(path)?;
    let result = ussd_dsl::validate(&graph);

    if json {
        let report = serde_json::json!({
            "flowId": graph.id.0,
            "errors": result.errors,
            "warnings": result.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for issue in result.errors.iter().chain(result.warnings.iter()) {
            let label = match issue.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            println!("{}: {}", label, issue);
        }
        println!(
            "{}: {} node(s), {} error(s), {} warning(s)",
            graph.id,
            graph.node_count(),
            result.errors.len(),
            result.warnings.len()
        );
    }

    if !result.is_valid() {
        bail!("Flow '{}' has {} error(s)", graph.id, result.errors.len());
    }
    Ok(())
}

async fn simulate(
    path: &Path,
    phone: &str,
    code: &str,
    monitoring_config: &MonitoringConfig,
) -> Result<()> {
    let graph = load_flow(path)?;
    let flow_id = graph.id.0.clone();
    let config = EngineConfig::load().context("Failed to load engine configuration")?;
    let sweep_interval = config.sweep_interval();

    let provider = InMemoryStateStoreProvider::new();
    let engine = Arc::new(provider.engine(
        Arc::new(ScriptedActionExecutor::new()),
        Arc::new(TracingEventHandler::new(monitoring_config)),
        config,
    ));
    let registry = Arc::new(FlowRegistry::new(provider.flow_repository()));
    let runtime = RuntimeInterface::new(engine.clone(), registry);

    let sweeper = Arc::new(ExpirySweeper::new(
        engine,
        provider.session_repository(),
        sweep_interval,
    ))
    .start();

    let version = runtime.publish_flow(graph).await?;
    info!(flow_id = %flow_id, version, "Flow loaded");

    let created = runtime.create_session(&flow_id, phone, code).await?;
    let session_id = created.session_id.0.clone();
    println!("{}", created.initial_prompt);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let response = match runtime.process_input(&session_id, &line).await {
            Ok(response) => response,
            Err(e) => {
                println!("Session ended: {}", e);
                break;
            }
        };

        if let Some(error) = &response.error {
            println!("! {}", error);
        }
        println!("{}", response.prompt);
        if response.terminated {
            break;
        }
    }

    sweeper.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_flow(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("balance")
            .suffix(suffix)
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write flow");
        file
    }

    #[test]
    fn test_load_json_flow_uses_file_stem_as_id() {
        let file = write_flow(
            ".json",
            r#"{"startNodeId": "start", "nodes": {"start": {"kind": "end", "text": "Bye"}}}"#,
        );
        let graph = load_flow(file.path()).expect("valid flow");
        let stem = file.path().file_stem().and_then(|s| s.to_str()).unwrap();
        assert_eq!(graph.id.0, stem);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_load_yaml_flow() {
        let file = write_flow(
            ".yaml",
            "id: bank\nstartNodeId: start\nnodes:\n  start:\n    kind: end\n    text: Bye\n",
        );
        let graph = load_flow(file.path()).expect("valid flow");
        assert_eq!(graph.id.0, "bank");
    }

    #[test]
    fn test_validate_rejects_dangling_reference() {
        let file = write_flow(
            ".json",
            r#"{"id": "bad", "startNodeId": "start", "nodes": {
                "start": {"kind": "input", "inputSpec": {"variableName": "x"}, "nextNodeId": "gone"}
            }}"#,
        );
        let err = validate(file.path(), false).unwrap_err();
        assert_eq!(err.to_string(), "Flow 'bad' has 1 error(s)");
    }
}
