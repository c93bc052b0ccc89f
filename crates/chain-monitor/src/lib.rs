//! Chain Monitor
//!
//! One long-lived monitor per chain samples shared validator and node
//! statistics on a fixed interval and turns threshold crossings into
//! edge-triggered alert calls.

mod error;
mod hysteresis;
mod monitor;
mod status;
mod telemetry;

pub use error::MonitorError;
pub use hysteresis::{AlarmEvaluator, AlarmKind, Transition};
pub use monitor::{ChainMonitor, MonitorConfig};
pub use status::{
    ChainStatus, NodeReport, NodeStatus, SharedChainStatus, StatusReport, ValidatorInfo,
    NOT_CONNECTED,
};
pub use telemetry::{record_metrics, MetricKind, MetricUpdate};
