//! Sink trait

use crate::error::NotifyError;
use alerting::{AlertMessage, Destination};
use async_trait::async_trait;

/// An external notification channel
#[async_trait]
pub trait Sink: Send + Sync {
    /// Destination this sink delivers to
    fn destination(&self) -> Destination;

    /// Deliver one message. Called at most once per forwarded alert.
    async fn deliver(&self, msg: &AlertMessage) -> Result<(), NotifyError>;
}

/// Short status label shown in front of every notification
pub fn label(msg: &AlertMessage) -> &'static str {
    if msg.is_resolved() {
        "💜 Resolved"
    } else {
        "🚨 ALERT"
    }
}

/// Mentions to append, only on triggers
pub(crate) fn mentions<'a>(msg: &AlertMessage, mentions: &'a str) -> Option<&'a str> {
    let mentions = mentions.trim();
    if msg.is_resolved() || mentions.is_empty() {
        None
    } else {
        Some(mentions)
    }
}
