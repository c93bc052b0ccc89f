//! Alert factory

use crate::dashboard::DashboardAlarms;
use crate::error::AlertError;
use crate::message::{AlertMessage, Destination, Severity, SinkRouting};
use crate::settings::{ChainSettings, NotifySettings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Builds alert messages from chain configuration and queues them for
/// the notification sinks.
///
/// Chain monitors call [`AlertFactory::alert`] once per hysteresis
/// transition; the factory never deduplicates itself.
pub struct AlertFactory {
    notify: NotifySettings,
    chains: HashMap<String, ChainSettings>,
    queue: mpsc::Sender<AlertMessage>,
    dashboard: Arc<DashboardAlarms>,
}

impl AlertFactory {
    /// Create a factory pushing onto `queue`
    pub fn new(
        notify: NotifySettings,
        chains: HashMap<String, ChainSettings>,
        queue: mpsc::Sender<AlertMessage>,
        dashboard: Arc<DashboardAlarms>,
    ) -> Self {
        Self {
            notify,
            chains,
            queue,
            dashboard,
        }
    }

    pub fn dashboard(&self) -> &Arc<DashboardAlarms> {
        &self.dashboard
    }

    /// Build the message for one alert call without queueing it.
    ///
    /// `id` overrides the chain's default unique id so several alarm
    /// kinds on the same chain do not collide downstream.
    pub fn build_message(
        &self,
        chain: &str,
        message: &str,
        severity: Severity,
        resolved: bool,
        id: Option<&str>,
    ) -> Result<AlertMessage, AlertError> {
        let settings = self
            .chains
            .get(chain)
            .ok_or_else(|| AlertError::UnknownChain(chain.to_string()))?;
        let alerts = &settings.alerts;
        let unique_id = id.unwrap_or(&settings.valoper_address);

        let routing = SinkRouting {
            pagerduty_key: self.notify.pagerduty.api_key.clone(),
            telegram_channel: self.notify.telegram.channel.clone(),
            telegram_key: self.notify.telegram.api_key.clone(),
            telegram_mentions: self.notify.telegram.mentions.join(" "),
            discord_webhook: self.notify.discord.webhook.clone(),
            discord_mentions: self.notify.discord.mentions.join(" "),
        };

        Ok(AlertMessage::builder(chain, message)
            .severity(severity)
            .resolved(resolved)
            .unique_id(unique_id)
            .enable(
                Destination::PagerDuty,
                self.notify.pagerduty.enabled && alerts.pagerduty_alerts,
            )
            .enable(
                Destination::Telegram,
                self.notify.telegram.enabled && alerts.telegram_alerts,
            )
            .enable(
                Destination::Discord,
                self.notify.discord.enabled && alerts.discord_alerts,
            )
            .routing(routing)
            .build())
    }

    /// Queue an alert and update the dashboard registry.
    ///
    /// Waits for queue capacity when the outbound queue is full. The
    /// dashboard is updated even if the queue has closed.
    pub async fn alert(
        &self,
        chain: &str,
        message: &str,
        severity: Severity,
        resolved: bool,
        id: Option<&str>,
    ) -> Result<(), AlertError> {
        let msg = self.build_message(chain, message, severity, resolved, id)?;
        debug!(chain, resolved, "Queueing alert: {}", message);

        let queued = self
            .queue
            .send(msg)
            .await
            .map_err(|_| AlertError::QueueClosed);
        self.dashboard.record(chain, message, resolved);
        queued
    }
}
