//! PagerDuty Events v2 sink

use crate::error::NotifyError;
use crate::sink::Sink;
use alerting::{AlertMessage, Destination};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::debug;

/// Events API v2 endpoint
pub const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";

/// Routing key shipped in the sample configuration; never sent
pub const PLACEHOLDER_ROUTING_KEY: &str = "aaaaaaaaaaaabbbbbbbbbbbbbcccccccccccc";

/// Events v2 request body
#[derive(Debug, Serialize)]
pub struct PagerDutyEvent<'a> {
    pub routing_key: &'a str,
    pub event_action: &'static str,
    pub dedup_key: &'a str,
    pub payload: PagerDutyPayload<'a>,
}

#[derive(Debug, Serialize)]
pub struct PagerDutyPayload<'a> {
    pub summary: &'a str,
    pub source: &'a str,
    pub severity: &'static str,
}

/// Triggers and resolves PagerDuty incidents keyed by the alert's unique id
pub struct PagerDutySink {
    client: reqwest::Client,
    endpoint: String,
}

impl PagerDutySink {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: EVENTS_API_URL.to_string(),
        }
    }

    /// Override the Events API endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Build the request body, rejecting unusable routing keys
    pub fn build_event(msg: &AlertMessage) -> Result<PagerDutyEvent<'_>, NotifyError> {
        let key = msg.routing().pagerduty_key.as_str();
        if key.is_empty() || key == PLACEHOLDER_ROUTING_KEY {
            return Err(NotifyError::InvalidCredentials(
                "invalid pagerduty key".to_string(),
            ));
        }
        Ok(PagerDutyEvent {
            routing_key: key,
            event_action: if msg.is_resolved() { "resolve" } else { "trigger" },
            dedup_key: msg.unique_id(),
            payload: PagerDutyPayload {
                summary: msg.message(),
                source: msg.unique_id(),
                severity: msg.severity().as_str(),
            },
        })
    }
}

#[async_trait]
impl Sink for PagerDutySink {
    fn destination(&self) -> Destination {
        Destination::PagerDuty
    }

    async fn deliver(&self, msg: &AlertMessage) -> Result<(), NotifyError> {
        let event = Self::build_event(msg)?;
        let body = serde_json::to_vec(&event)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                service: "PagerDuty",
                status: status.as_u16(),
            });
        }
        debug!(chain = msg.chain(), action = event.event_action, "PagerDuty event accepted");
        Ok(())
    }
}
