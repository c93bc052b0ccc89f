//! Shared chain status, written by the RPC poller and read by monitors

use alerting::ChainSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Moniker reported before the poller has reached any node
pub const NOT_CONNECTED: &str = "not connected";

/// Validator identity and signing statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorInfo {
    /// Validator name, or "not connected" until a node answers
    pub moniker: String,
    /// Consensus address, default identity for alarms and metrics
    pub valcons: String,
    /// Blocks missed in the current slashing window
    pub missed: i64,
    /// Slashing window size in blocks
    pub window: i64,
}

/// Reachability of one RPC node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    /// RPC endpoint URL, also the node-down alarm identity
    pub url: String,
    /// Raise the node-down alarm for this node
    pub alert_if_down: bool,
    /// Last request to the node failed
    pub down: bool,
    /// Set when the node first failed, cleared once it answers again
    pub down_since: Option<DateTime<Utc>>,
}

/// Latest statistics for one chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainStatus {
    pub validator: Option<ValidatorInfo>,
    /// Blocks missed in a row by the validator
    pub consecutive_missed: u64,
    /// Time the last block was seen, cleared when the chain advances again
    pub last_block_time: Option<DateTime<Utc>>,
    /// No RPC endpoint is reachable
    pub no_nodes: bool,
    /// Configured nodes, in configuration order
    pub nodes: Vec<NodeStatus>,
}

impl ChainStatus {
    /// Initial status with every configured node assumed up
    pub fn from_settings(settings: &ChainSettings) -> Self {
        Self {
            nodes: settings
                .nodes
                .iter()
                .map(|node| NodeStatus {
                    url: node.url.clone(),
                    alert_if_down: node.alert_if_down,
                    down: false,
                    down_since: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Whether the validator's moniker is known
    pub fn is_identified(&self) -> bool {
        self.validator
            .as_ref()
            .map(|v| !v.moniker.is_empty() && v.moniker != NOT_CONNECTED)
            .unwrap_or(false)
    }

    /// Consensus address, if known
    pub fn valcons(&self) -> Option<&str> {
        self.validator
            .as_ref()
            .map(|v| v.valcons.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// Reachability of one node as reported by the poller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReport {
    pub url: String,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub down_since: Option<DateTime<Utc>>,
}

/// Statistics pushed by an external RPC poller.
///
/// Node entries only update nodes present in the configuration; the
/// `alert_if_down` flag always comes from the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusReport {
    pub validator: Option<ValidatorInfo>,
    pub consecutive_missed: u64,
    pub last_block_time: Option<DateTime<Utc>>,
    pub no_nodes: bool,
    pub nodes: Vec<NodeReport>,
}

impl ChainStatus {
    /// Replace the statistics with `report`. Returns the number of
    /// reported nodes that are not configured for this chain.
    pub fn apply_report(&mut self, report: StatusReport) -> usize {
        self.validator = report.validator;
        self.consecutive_missed = report.consecutive_missed;
        self.last_block_time = report.last_block_time;
        self.no_nodes = report.no_nodes;

        let mut unknown = 0;
        for reported in report.nodes {
            match self.nodes.iter_mut().find(|n| n.url == reported.url) {
                Some(node) => {
                    node.down = reported.down;
                    node.down_since = reported.down_since;
                }
                None => unknown += 1,
            }
        }
        unknown
    }
}

/// Handle to a chain's status shared between the poller and the monitor
#[derive(Debug, Clone, Default)]
pub struct SharedChainStatus {
    inner: Arc<RwLock<ChainStatus>>,
}

impl SharedChainStatus {
    /// Create a new shared status
    pub fn new(status: ChainStatus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(status)),
        }
    }

    /// Clone the current status; no lock is held afterwards
    pub fn snapshot(&self) -> ChainStatus {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutate the status in place
    pub fn update<R>(&self, f: impl FnOnce(&mut ChainStatus) -> R) -> R {
        let mut status = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::NodeSettings;

    #[test]
    fn test_identification() {
        let mut status = ChainStatus::default();
        assert!(!status.is_identified());

        status.validator = Some(ValidatorInfo {
            moniker: NOT_CONNECTED.to_string(),
            ..Default::default()
        });
        assert!(!status.is_identified());

        status.validator = Some(ValidatorInfo {
            moniker: "validator-one".to_string(),
            ..Default::default()
        });
        assert!(status.is_identified());
        assert_eq!(status.valcons(), None);
    }

    #[test]
    fn test_from_settings_and_update() {
        let settings = ChainSettings {
            nodes: vec![NodeSettings {
                url: "tcp://10.0.0.1:26657".to_string(),
                alert_if_down: true,
            }],
            ..Default::default()
        };
        let shared = SharedChainStatus::new(ChainStatus::from_settings(&settings));
        shared.update(|s| s.nodes[0].down = true);

        let snapshot = shared.snapshot();
        assert!(snapshot.nodes[0].down);
        assert!(snapshot.nodes[0].alert_if_down);
    }

    #[test]
    fn test_apply_report_keeps_configured_flags() {
        let settings = ChainSettings {
            nodes: vec![
                NodeSettings {
                    url: "tcp://10.0.0.1:26657".to_string(),
                    alert_if_down: true,
                },
                NodeSettings {
                    url: "tcp://10.0.0.2:26657".to_string(),
                    alert_if_down: false,
                },
            ],
            ..Default::default()
        };
        let mut status = ChainStatus::from_settings(&settings);
        let since = Utc::now();
        let report = StatusReport {
            validator: Some(ValidatorInfo {
                moniker: "validator-one".to_string(),
                valcons: "valcons1xyz".to_string(),
                missed: 3,
                window: 10_000,
            }),
            consecutive_missed: 2,
            nodes: vec![
                NodeReport {
                    url: "tcp://10.0.0.1:26657".to_string(),
                    down: true,
                    down_since: Some(since),
                },
                NodeReport {
                    url: "tcp://10.0.0.9:26657".to_string(),
                    down: true,
                    down_since: None,
                },
            ],
            ..Default::default()
        };

        assert_eq!(status.apply_report(report), 1);
        assert!(status.is_identified());
        assert_eq!(status.consecutive_missed, 2);
        assert!(status.nodes[0].down);
        assert!(status.nodes[0].alert_if_down);
        assert_eq!(status.nodes[0].down_since, Some(since));
        // not reported: unchanged
        assert!(!status.nodes[1].down);
        assert_eq!(status.nodes.len(), 2);
    }
}
