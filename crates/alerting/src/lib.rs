//! Alerting Core
//!
//! Provides the alert message model, per-destination deduplication,
//! the dashboard alarm registry, and the factory chain monitors use to
//! report alarm transitions.

mod dashboard;
mod dedup;
mod error;
mod factory;
mod message;
mod settings;

pub use dashboard::DashboardAlarms;
pub use dedup::DedupRegistry;
pub use error::AlertError;
pub use factory::AlertFactory;
pub use message::{AlertMessage, AlertMessageBuilder, Destination, Severity, SinkRouting};
pub use settings::{
    ChainAlertSettings, ChainSettings, DiscordSettings, NodeSettings, NotifySettings,
    PagerDutySettings, TelegramSettings,
};
