//! Monitoring for the USSD flow engine.
//!
//! Structured logging setup, a tracing-based analytics sink for session
//! events and `metrics` counters per event type.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

pub mod event_sink;
pub mod logging;
pub mod metrics;

pub use event_sink::{EventCounters, TracingEventHandler};
pub use logging::{init_logging, LogExt};
pub use crate::metrics::SessionMetrics;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for development
    Pretty,
    /// One JSON object per line, for log aggregation
    Json,
}

/// Configuration for initializing the monitoring system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to log output
    pub service_name: String,
    /// Emit `metrics` counters from the event sink
    pub enable_metrics: bool,
    /// Log level filter (e.g., "info,ussd_core=debug"), used when RUST_LOG is unset
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Environment (dev, staging, prod)
    pub environment: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "ussd-flow".to_string(),
            enable_metrics: true,
            log_filter: "info".to_string(),
            log_format: LogFormat::Pretty,
            environment: "dev".to_string(),
        }
    }
}

impl MonitoringConfig {
    /// Defaults overridden by USSD_SERVICE_NAME, USSD_LOG_FILTER,
    /// USSD_LOG_FORMAT (`pretty` or `json`), USSD_ENABLE_METRICS and
    /// USSD_ENVIRONMENT
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = env::var("USSD_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Ok(filter) = env::var("USSD_LOG_FILTER") {
            config.log_filter = filter;
        }
        if let Ok(format) = env::var("USSD_LOG_FORMAT") {
            match format.to_ascii_lowercase().as_str() {
                "json" => config.log_format = LogFormat::Json,
                "pretty" => config.log_format = LogFormat::Pretty,
                _ => warn!("Invalid USSD_LOG_FORMAT value: {}", format),
            }
        }
        if let Ok(enabled) = env::var("USSD_ENABLE_METRICS") {
            match enabled.parse::<bool>() {
                Ok(value) => config.enable_metrics = value,
                Err(_) => warn!("Invalid USSD_ENABLE_METRICS value: {}", enabled),
            }
        }
        if let Ok(environment) = env::var("USSD_ENVIRONMENT") {
            config.environment = environment;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MonitoringConfig::default();
        assert_eq!(config.service_name, "ussd-flow");
        assert!(config.enable_metrics);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("USSD_LOG_FORMAT", "JSON");
        env::set_var("USSD_ENABLE_METRICS", "not-a-bool");
        env::set_var("USSD_LOG_FILTER", "debug");

        let config = MonitoringConfig::from_env();
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.enable_metrics, "invalid values are ignored");
        assert_eq!(config.log_filter, "debug");

        env::remove_var("USSD_LOG_FORMAT");
        env::remove_var("USSD_ENABLE_METRICS");
        env::remove_var("USSD_LOG_FILTER");
    }
}
