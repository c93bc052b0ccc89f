//! Discord webhook sink

use crate::error::NotifyError;
use crate::sink::{label, mentions, Sink};
use alerting::{AlertMessage, Destination};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

const TRIGGER_COLOR: u32 = 0xE7_4C_3C;
const RESOLVED_COLOR: u32 = 0x9B_59_B6;

/// Webhook execute body
#[derive(Debug, Clone, Serialize)]
pub struct DiscordMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscordEmbed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub description: String,
    pub color: u32,
}

/// Posts alerts to a Discord channel webhook
pub struct DiscordSink {
    client: reqwest::Client,
}

impl DiscordSink {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn build_message(msg: &AlertMessage) -> DiscordMessage {
        let mut content = format!("{}: {}", label(msg), msg.chain());
        if let Some(mentions) = mentions(msg, &msg.routing().discord_mentions) {
            content.push(' ');
            content.push_str(mentions);
        }
        DiscordMessage {
            username: Some("valwatch".to_string()),
            avatar_url: None,
            content,
            embeds: vec![DiscordEmbed {
                title: None,
                url: None,
                description: msg.message().to_string(),
                color: if msg.is_resolved() { RESOLVED_COLOR } else { TRIGGER_COLOR },
            }],
        }
    }
}

#[async_trait]
impl Sink for DiscordSink {
    fn destination(&self) -> Destination {
        Destination::Discord
    }

    async fn deliver(&self, msg: &AlertMessage) -> Result<(), NotifyError> {
        let webhook = msg.routing().discord_webhook.as_str();
        if webhook.is_empty() {
            return Err(NotifyError::InvalidCredentials(
                "discord webhook is not set".to_string(),
            ));
        }

        let body = serde_json::to_vec(&Self::build_message(msg))?;
        let resp = self
            .client
            .post(webhook)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        // webhooks answer 204 No Content unless ?wait=true
        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                service: "Discord",
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
