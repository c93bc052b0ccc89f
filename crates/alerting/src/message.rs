//! Alert message model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert severity, named the way PagerDuty Events v2 expects it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Validator is at risk of slashing or already offline
    #[default]
    Critical,
    /// Needs operator attention soon
    Error,
    /// Degraded but not yet dangerous
    Warning,
    /// Informational only
    Info,
}

impl Severity {
    /// Lowercase name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// PagerDuty Events v2
    PagerDuty,
    /// Telegram bot message
    Telegram,
    /// Discord webhook
    Discord,
}

impl Destination {
    /// Every destination, in dispatch order
    pub const ALL: [Destination; 3] = [
        Destination::PagerDuty,
        Destination::Telegram,
        Destination::Discord,
    ];

    /// Human readable service name for logs
    pub fn service_name(&self) -> &'static str {
        match self {
            Destination::PagerDuty => "PagerDuty",
            Destination::Telegram => "Telegram",
            Destination::Discord => "Discord",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

/// Per-sink routing and credential data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkRouting {
    /// PagerDuty Events v2 routing key
    pub pagerduty_key: String,
    /// Telegram channel or chat id
    pub telegram_channel: String,
    /// Telegram bot token
    pub telegram_key: String,
    /// Space separated Telegram mentions
    pub telegram_mentions: String,
    /// Discord webhook URL
    pub discord_webhook: String,
    /// Space separated Discord mentions
    pub discord_mentions: String,
}

/// One alarm occurrence or resolution.
///
/// The message text is the deduplication key, so two distinct alarm
/// conditions must never produce identical text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pagerduty: bool,
    telegram: bool,
    discord: bool,
    severity: Severity,
    resolved: bool,
    chain: String,
    message: String,
    unique_id: String,
    routing: SinkRouting,
}

impl AlertMessage {
    /// Start building a message for `chain` with the given text
    pub fn builder(chain: impl Into<String>, message: impl Into<String>) -> AlertMessageBuilder {
        AlertMessageBuilder {
            msg: AlertMessage {
                pagerduty: false,
                telegram: false,
                discord: false,
                severity: Severity::default(),
                resolved: false,
                chain: chain.into(),
                message: message.into(),
                unique_id: String::new(),
                routing: SinkRouting::default(),
            },
        }
    }

    /// Whether delivery to `dest` is enabled for this message
    pub fn enabled_for(&self, dest: Destination) -> bool {
        match dest {
            Destination::PagerDuty => self.pagerduty,
            Destination::Telegram => self.telegram,
            Destination::Discord => self.discord,
        }
    }

    /// Severity reported to the sinks
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Whether this message clears an earlier alarm
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Configured chain name
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Human readable text, also the dedup key
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Identity of the alarm kind, used as the PagerDuty dedup key
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Per-sink credentials and mentions
    pub fn routing(&self) -> &SinkRouting {
        &self.routing
    }
}

/// Builder for [`AlertMessage`]
#[derive(Debug, Clone)]
pub struct AlertMessageBuilder {
    msg: AlertMessage,
}

impl AlertMessageBuilder {
    /// Set the severity (default: critical)
    pub fn severity(mut self, severity: Severity) -> Self {
        self.msg.severity = severity;
        self
    }

    /// Mark the message as a resolution
    pub fn resolved(mut self, resolved: bool) -> Self {
        self.msg.resolved = resolved;
        self
    }

    /// Set the alarm identity
    pub fn unique_id(mut self, id: impl Into<String>) -> Self {
        self.msg.unique_id = id.into();
        self
    }

    /// Enable or disable delivery to one destination
    pub fn enable(mut self, dest: Destination, enabled: bool) -> Self {
        match dest {
            Destination::PagerDuty => self.msg.pagerduty = enabled,
            Destination::Telegram => self.msg.telegram = enabled,
            Destination::Discord => self.msg.discord = enabled,
        }
        self
    }

    /// Set the per-sink routing data
    pub fn routing(mut self, routing: SinkRouting) -> Self {
        self.msg.routing = routing;
        self
    }

    /// Finish the message
    pub fn build(self) -> AlertMessage {
        self.msg
    }
}
