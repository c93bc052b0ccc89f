//! Telegram bot sink

use crate::error::NotifyError;
use crate::sink::{label, mentions, Sink};
use alerting::{AlertMessage, Destination};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

/// Bot API base URL
pub const BOT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
}

/// Posts alerts to a Telegram channel through the Bot API
pub struct TelegramSink {
    client: reqwest::Client,
    api_url: String,
}

impl TelegramSink {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: BOT_API_URL.to_string(),
        }
    }

    /// Override the Bot API base URL
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Message text: `<chain>: <label> - <message>`, mentions on triggers
    pub fn format_text(msg: &AlertMessage) -> String {
        let mut text = format!("{}: {} - {}", msg.chain(), label(msg), msg.message());
        if let Some(mentions) = mentions(msg, &msg.routing().telegram_mentions) {
            text.push('\n');
            text.push_str(mentions);
        }
        text
    }
}

#[async_trait]
impl Sink for TelegramSink {
    fn destination(&self) -> Destination {
        Destination::Telegram
    }

    async fn deliver(&self, msg: &AlertMessage) -> Result<(), NotifyError> {
        let routing = msg.routing();
        if routing.telegram_key.is_empty() || routing.telegram_channel.is_empty() {
            return Err(NotifyError::InvalidCredentials(
                "telegram api key and channel are required".to_string(),
            ));
        }

        let body = serde_json::to_vec(&SendMessage {
            chat_id: &routing.telegram_channel,
            text: Self::format_text(msg),
        })?;
        let url = format!("{}/bot{}/sendMessage", self.api_url, routing.telegram_key);

        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NotifyError::InvalidCredentials(
                "telegram rejected the bot token".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(NotifyError::Status {
                service: "Telegram",
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
