//! Chain Monitor Error Types

use alerting::AlertError;
use thiserror::Error;

/// Errors surfaced at the per-tick boundary
#[derive(Debug, Error)]
pub enum MonitorError {
    /// An alarm transition could not be reported
    #[error("Alert failed: {0}")]
    Alert(#[from] AlertError),
}
