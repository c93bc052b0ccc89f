//! Notification Delivery
//!
//! Sink adapters for the supported destinations and the dispatcher that
//! consumes the outbound alert queue:
//! - One worker per sink, so a slow destination only delays itself
//! - Deduplication decided before delivery, never held across I/O
//! - Bounded delivery time; failures are logged and not retried

mod discord;
mod dispatcher;
mod error;
mod pagerduty;
mod sink;
mod telegram;

pub use discord::{DiscordEmbed, DiscordMessage, DiscordSink};
pub use dispatcher::{notify, Dispatcher, DispatcherConfig};
pub use error::NotifyError;
pub use pagerduty::{
    PagerDutyEvent, PagerDutyPayload, PagerDutySink, EVENTS_API_URL, PLACEHOLDER_ROUTING_KEY,
};
pub use sink::{label, Sink};
pub use telegram::{TelegramSink, BOT_API_URL};
