//! Alerting Error Types

use thiserror::Error;

/// Errors raised while building or queueing an alert
#[derive(Debug, Error)]
pub enum AlertError {
    /// The chain has no configuration entry
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    /// The outbound queue consumer has gone away
    #[error("Alert queue closed")]
    QueueClosed,
}
