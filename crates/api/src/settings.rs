//! Daemon settings
//!
//! Loaded from an optional YAML/TOML/JSON file layered under
//! `VALWATCH__*` environment variables.

use alerting::{
    ChainSettings, DiscordSettings, NotifySettings, PagerDutySettings, TelegramSettings,
};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Config file used when neither the CLI nor the environment names one
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "VALWATCH_CONFIG";

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Dashboard HTTP listener
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub enabled: bool,
    pub listen: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: "127.0.0.1:8888".to_string(),
        }
    }
}

/// Prometheus exporter listener
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrometheusSettings {
    pub enabled: bool,
    pub listen: String,
}

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "127.0.0.1:28686".to_string(),
        }
    }
}

/// Top level settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Hide alarm text on the dashboard
    pub hide_logs: bool,
    /// Minutes a node must be down before alerting
    pub node_down_alert_minutes: u64,
    pub alert_queue_capacity: usize,
    pub metrics_queue_capacity: usize,
    pub log_format: LogFormat,
    pub dashboard: DashboardSettings,
    pub prometheus: PrometheusSettings,
    pub pagerduty: PagerDutySettings,
    pub discord: DiscordSettings,
    pub telegram: TelegramSettings,
    pub chains: HashMap<String, ChainSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hide_logs: false,
            node_down_alert_minutes: 3,
            alert_queue_capacity: 64,
            metrics_queue_capacity: 256,
            log_format: LogFormat::Text,
            dashboard: DashboardSettings::default(),
            prometheus: PrometheusSettings::default(),
            pagerduty: PagerDutySettings::default(),
            discord: DiscordSettings::default(),
            telegram: TelegramSettings::default(),
            chains: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load and validate settings.
    ///
    /// The file path is `path`, else `$VALWATCH_CONFIG`, else
    /// `config.yml`; a missing file is not an error.
    pub fn load(path: Option<&str>) -> Result<Self, SettingsError> {
        let path = path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let settings: Settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("VALWATCH").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate settings from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Sink settings handed to the alert factory
    pub fn notify_settings(&self) -> NotifySettings {
        NotifySettings {
            pagerduty: self.pagerduty.clone(),
            discord: self.discord.clone(),
            telegram: self.telegram.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chains.is_empty() {
            return Err(invalid("no chains configured"));
        }
        if self.alert_queue_capacity == 0 || self.metrics_queue_capacity == 0 {
            return Err(invalid("queue capacities must be positive"));
        }
        for (name, chain) in &self.chains {
            let alerts = &chain.alerts;
            if chain.chain_id.is_empty() {
                return Err(invalid(format!("chain {name}: chain_id is required")));
            }
            if alerts.consecutive_enabled && alerts.consecutive_missed == 0 {
                return Err(invalid(format!("chain {name}: consecutive_missed must be > 0")));
            }
            if alerts.percentage_enabled && !(1..=100).contains(&alerts.window_percent) {
                return Err(invalid(format!(
                    "chain {name}: window_percent must be between 1 and 100"
                )));
            }
            if alerts.stalled_enabled && alerts.stalled_minutes == 0 {
                return Err(invalid(format!("chain {name}: stalled_minutes must be > 0")));
            }
        }
        if self.pagerduty.enabled && self.pagerduty.api_key.is_empty() {
            return Err(invalid("pagerduty is enabled without an api_key"));
        }
        if self.discord.enabled && self.discord.webhook.is_empty() {
            return Err(invalid("discord is enabled without a webhook"));
        }
        if self.telegram.enabled && (self.telegram.api_key.is_empty() || self.telegram.channel.is_empty()) {
            return Err(invalid("telegram is enabled without an api_key and channel"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::Severity;

    const SAMPLE: &str = r#"
hide_logs: true
node_down_alert_minutes: 10
pagerduty:
  enabled: true
  api_key: aaaaaaaaaaaabbbbbbbbbbbbbcccccccccccc
  default_severity: alert
telegram:
  enabled: false
discord:
  enabled: true
  webhook: https://discord.com/api/webhooks/1/abc
  mentions: ["<@1>", "<@2>"]
chains:
  osmosis:
    chain_id: osmosis-1
    valoper_address: osmovaloper1abc
    alerts:
      consecutive_missed: 8
      consecutive_priority: warning
      percentage_enabled: true
      window_percent: 5
    nodes:
      - url: tcp://10.0.0.1:26657
        alert_if_down: true
      - url: tcp://10.0.0.2:26657
"#;

    #[test]
    fn test_sample_config() {
        let settings = Settings::from_yaml(SAMPLE).unwrap();

        assert!(settings.hide_logs);
        assert_eq!(settings.node_down_alert_minutes, 10);
        assert_eq!(settings.alert_queue_capacity, 64);
        assert_eq!(settings.log_format, LogFormat::Text);
        assert!(settings.dashboard.enabled);

        let osmosis = &settings.chains["osmosis"];
        assert_eq!(osmosis.chain_id, "osmosis-1");
        assert_eq!(osmosis.alerts.consecutive_missed, 8);
        assert_eq!(osmosis.alerts.consecutive_priority, Severity::Warning);
        // untouched fields keep their defaults
        assert!(osmosis.alerts.stalled_enabled);
        assert_eq!(osmosis.alerts.stalled_minutes, 10);
        assert_eq!(osmosis.nodes.len(), 2);
        assert!(osmosis.nodes[0].alert_if_down);
        assert!(!osmosis.nodes[1].alert_if_down);

        let notify = settings.notify_settings();
        assert!(notify.pagerduty.enabled);
        // severity comes from each alarm, older configs may still carry a default
        assert_eq!(notify.pagerduty.api_key, "aaaaaaaaaaaabbbbbbbbbbbbbcccccccccccc");
        assert_eq!(notify.discord.mentions, vec!["<@1>", "<@2>"]);
    }

    #[test]
    fn test_rejects_missing_chains() {
        let err = Settings::from_yaml("hide_logs: false\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let yaml = r#"
chains:
  osmosis:
    chain_id: osmosis-1
    alerts:
      percentage_enabled: true
      window_percent: 150
"#;
        let err = Settings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("window_percent"));
    }

    #[test]
    fn test_rejects_enabled_sink_without_credentials() {
        let yaml = r#"
telegram:
  enabled: true
  api_key: "123:abc"
chains:
  osmosis:
    chain_id: osmosis-1
"#;
        let err = Settings::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("telegram"));
    }
}
