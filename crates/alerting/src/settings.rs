//! Alert routing and threshold settings

use crate::message::Severity;
use serde::{Deserialize, Serialize};

/// PagerDuty sink settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerDutySettings {
    pub enabled: bool,
    /// Events v2 routing key
    pub api_key: String,
}

/// Discord webhook sink settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordSettings {
    pub enabled: bool,
    pub webhook: String,
    pub mentions: Vec<String>,
}

/// Telegram bot sink settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub enabled: bool,
    /// Bot token
    pub api_key: String,
    pub channel: String,
    pub mentions: Vec<String>,
}

/// Global sink settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub pagerduty: PagerDutySettings,
    pub discord: DiscordSettings,
    pub telegram: TelegramSettings,
}

/// Per-chain alarm thresholds and sink toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainAlertSettings {
    /// Alert when no new block is seen for `stalled_minutes`
    pub stalled_enabled: bool,
    pub stalled_minutes: u64,

    /// Alert when the validator misses `consecutive_missed` blocks in a row
    pub consecutive_enabled: bool,
    pub consecutive_missed: u64,
    pub consecutive_priority: Severity,

    /// Alert when more than `window_percent` of the slashing window is missed
    pub percentage_enabled: bool,
    pub window_percent: u32,
    pub percentage_priority: Severity,

    /// Alert when no RPC endpoint for the chain is reachable
    pub alert_if_no_servers: bool,

    pub pagerduty_alerts: bool,
    pub discord_alerts: bool,
    pub telegram_alerts: bool,
}

impl Default for ChainAlertSettings {
    fn default() -> Self {
        Self {
            stalled_enabled: true,
            stalled_minutes: 10,
            consecutive_enabled: true,
            consecutive_missed: 5,
            consecutive_priority: Severity::Critical,
            percentage_enabled: false,
            window_percent: 10,
            percentage_priority: Severity::Critical,
            alert_if_no_servers: true,
            pagerduty_alerts: true,
            discord_alerts: true,
            telegram_alerts: true,
        }
    }
}

/// A monitored RPC node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    pub url: String,
    #[serde(default)]
    pub alert_if_down: bool,
}

/// One monitored chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    pub chain_id: String,
    /// Operator address, the default unique id for alerts
    pub valoper_address: String,
    pub alerts: ChainAlertSettings,
    pub nodes: Vec<NodeSettings>,
}
