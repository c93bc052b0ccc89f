//! Metric updates pushed by chain monitors

use tokio::sync::mpsc;
use tracing::debug;

/// Gauges emitted by chain monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Seconds since the last block, ignoring finality
    LastBlockSecondsNotFinal,
    /// Seconds a node has been unreachable
    NodeDownSeconds,
}

impl MetricKind {
    /// Prometheus metric name
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::LastBlockSecondsNotFinal => "valwatch_last_block_seconds_not_final",
            MetricKind::NodeDownSeconds => "valwatch_node_down_seconds",
        }
    }
}

/// One gauge sample for a chain, optionally labelled with a node URL
#[derive(Debug, Clone, PartialEq)]
pub struct MetricUpdate {
    pub chain: String,
    pub kind: MetricKind,
    pub value: f64,
    pub node: Option<String>,
}

impl MetricUpdate {
    pub fn new(chain: impl Into<String>, kind: MetricKind, value: f64, node: Option<String>) -> Self {
        Self {
            chain: chain.into(),
            kind,
            value,
            node,
        }
    }

    /// Write the sample to the installed `metrics` recorder
    pub fn record(&self) {
        let name = self.kind.name();
        match &self.node {
            Some(node) => {
                ::metrics::gauge!(name, "chain" => self.chain.clone(), "node" => node.clone())
                    .set(self.value);
            }
            None => {
                ::metrics::gauge!(name, "chain" => self.chain.clone()).set(self.value);
            }
        }
    }
}

/// Drain metric updates until every sender is dropped
pub async fn record_metrics(mut rx: mpsc::Receiver<MetricUpdate>) {
    while let Some(update) = rx.recv().await {
        update.record();
    }
    debug!("Metrics queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert_eq!(
            MetricKind::LastBlockSecondsNotFinal.name(),
            "valwatch_last_block_seconds_not_final"
        );
        assert_eq!(MetricKind::NodeDownSeconds.name(), "valwatch_node_down_seconds");
    }

    #[tokio::test]
    async fn test_recorder_drains_until_closed() {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(record_metrics(rx));

        tx.send(MetricUpdate::new("chainA", MetricKind::NodeDownSeconds, 0.0, Some("tcp://a".to_string())))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
