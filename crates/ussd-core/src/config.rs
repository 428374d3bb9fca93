//! Configuration for the session engine
//!
//! Defaults suit a production USSD gateway; every value can be overridden
//! from the environment with [`EngineConfig::load`].

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

use crate::CoreError;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Inactivity window after which a session expires, renewed on each input
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    /// How often the expiry sweeper scans for lapsed sessions
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Upper bound on a single payment or api call
    #[serde(default = "default_external_action_timeout_ms")]
    pub external_action_timeout_ms: u64,

    /// Maximum number of non-interactive nodes resolved within one request
    #[serde(default = "default_max_auto_transitions")]
    pub max_auto_transitions: u32,

    /// Shown when a session ends without an end node prompt
    #[serde(default = "default_goodbye_message")]
    pub goodbye_message: String,
}

fn default_session_timeout_secs() -> u64 {
    1800 // 30 minutes
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_external_action_timeout_ms() -> u64 {
    5000
}

fn default_max_auto_transitions() -> u32 {
    16
}

fn default_goodbye_message() -> String {
    "Thank you for using our service.".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            external_action_timeout_ms: default_external_action_timeout_ms(),
            max_auto_transitions: default_max_auto_transitions(),
            goodbye_message: default_goodbye_message(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn load() -> Result<Self, CoreError> {
        let mut config = Self::default();

        if let Some(secs) = parse_env("USSD_SESSION_TIMEOUT_SECS") {
            config.session_timeout_secs = secs;
        }

        if let Some(secs) = parse_env("USSD_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = secs;
        }

        if let Some(ms) = parse_env("USSD_EXTERNAL_ACTION_TIMEOUT_MS") {
            config.external_action_timeout_ms = ms;
        }

        if let Some(max) = parse_env("USSD_MAX_AUTO_TRANSITIONS") {
            config.max_auto_transitions = max;
        }

        if let Ok(message) = env::var("USSD_GOODBYE_MESSAGE") {
            config.goodbye_message = message;
        }

        config.validate()?;

        info!(
            session_timeout_secs = config.session_timeout_secs,
            sweep_interval_secs = config.sweep_interval_secs,
            external_action_timeout_ms = config.external_action_timeout_ms,
            "Engine configuration loaded"
        );

        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.session_timeout_secs == 0 {
            return Err(CoreError::Configuration(
                "session_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(CoreError::Configuration(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.external_action_timeout_ms == 0 {
            return Err(CoreError::Configuration(
                "external_action_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_timeout_secs as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn external_action_timeout(&self) -> Duration {
        Duration::from_millis(self.external_action_timeout_ms)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid {} value: {}", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.session_timeout(), chrono::Duration::minutes(30));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serde_fills_missing_fields() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"session_timeout_secs": 120}"#).unwrap();
        assert_eq!(config.session_timeout_secs, 120);
        assert_eq!(config.max_auto_transitions, 16);
        assert_eq!(config.goodbye_message, "Thank you for using our service.");
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let config = EngineConfig {
            external_action_timeout_ms: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Configuration(_))));
    }

    #[test]
    fn test_load_ignores_invalid_values() {
        env::set_var("USSD_MAX_AUTO_TRANSITIONS", "lots");
        env::set_var("USSD_SWEEP_INTERVAL_SECS", "15");
        let config = EngineConfig::load().unwrap();
        env::remove_var("USSD_MAX_AUTO_TRANSITIONS");
        env::remove_var("USSD_SWEEP_INTERVAL_SECS");

        assert_eq!(config.max_auto_transitions, 16);
        assert_eq!(config.sweep_interval_secs, 15);
    }
}
