//! Notification Error Types

use thiserror::Error;

/// Errors raised while delivering a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Missing or placeholder credentials; the sink is skipped
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} delivery timed out after {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        NotifyError::Serialization(err.to_string())
    }
}
