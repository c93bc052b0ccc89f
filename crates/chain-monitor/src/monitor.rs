//! Chain Monitor Implementation

use crate::error::MonitorError;
use crate::hysteresis::{AlarmEvaluator, Transition};
use crate::status::{ChainStatus, SharedChainStatus};
use crate::telemetry::{MetricKind, MetricUpdate};
use alerting::{AlertFactory, ChainSettings};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Sampling intervals for a chain monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between alarm evaluations (default: 2s)
    pub tick_interval: Duration,
    /// Interval between identity checks before the first tick (default: 1s)
    pub identity_poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            identity_poll_interval: Duration::from_secs(1),
        }
    }
}

/// Long-lived monitor for one chain.
///
/// All hysteresis state is owned by the monitor task; the only shared
/// state it touches is the chain status (read) and the alert factory.
pub struct ChainMonitor {
    name: String,
    node_urls: Vec<String>,
    evaluator: AlarmEvaluator,
    status: SharedChainStatus,
    factory: Arc<AlertFactory>,
    metrics: Option<mpsc::Sender<MetricUpdate>>,
    nodes_reported_down: HashSet<String>,
    active_alerts: Arc<AtomicUsize>,
    config: MonitorConfig,
}

impl ChainMonitor {
    /// Create a monitor for chain `name`
    pub fn new(
        name: impl Into<String>,
        settings: &ChainSettings,
        node_down_minutes: u64,
        status: SharedChainStatus,
        factory: Arc<AlertFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            node_urls: settings.nodes.iter().map(|n| n.url.clone()).collect(),
            evaluator: AlarmEvaluator::new(
                settings.chain_id.clone(),
                settings.alerts.clone(),
                node_down_minutes,
            ),
            status,
            factory,
            metrics: None,
            nodes_reported_down: HashSet::new(),
            active_alerts: Arc::new(AtomicUsize::new(0)),
            config: MonitorConfig::default(),
        }
    }

    /// Push gauge samples to `tx` on every tick
    pub fn with_metrics(mut self, tx: mpsc::Sender<MetricUpdate>) -> Self {
        self.metrics = Some(tx);
        self
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared view of the number of active alarms, for health summaries
    pub fn active_alerts_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active_alerts)
    }

    /// Run until `stop` flips to true or its sender is dropped
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!(chain = %self.name, "Starting chain monitor");

        if !self.wait_for_identity(&mut stop).await {
            info!(chain = %self.name, "Chain monitor stopped before identity was known");
            return;
        }
        self.push_initial_metrics().await;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.tick_interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if let Err(e) = self.tick(Utc::now()).await {
                warn!(chain = %self.name, "Alarm evaluation failed: {}", e);
            }
        }

        info!(chain = %self.name, "Chain monitor stopped");
    }

    /// Block until the validator moniker is known, raising the no-RPC
    /// alarm meanwhile. Returns false if stopped first.
    async fn wait_for_identity(&mut self, stop: &mut watch::Receiver<bool>) -> bool {
        loop {
            if *stop.borrow() {
                return false;
            }
            let snapshot = self.status.snapshot();
            if snapshot.is_identified() {
                return true;
            }
            if let Some(transition) = self.evaluator.check_no_rpc(&snapshot) {
                if let Err(e) = self.apply(vec![transition]).await {
                    warn!(chain = %self.name, "Alarm evaluation failed: {}", e);
                }
            }
            debug!(chain = %self.name, "Waiting for validator identity");
            tokio::select! {
                _ = tokio::time::sleep(self.config.identity_poll_interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Evaluate every alarm condition once and report transitions
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<(), MonitorError> {
        let snapshot = self.status.snapshot();
        let transitions = self.evaluator.evaluate(&snapshot, now);
        let result = self.apply(transitions).await;
        self.push_metrics(&snapshot, now).await;
        result
    }

    /// Report transitions in order. Every transition is attempted; the
    /// first failure is returned.
    async fn apply(&mut self, transitions: Vec<Transition>) -> Result<(), MonitorError> {
        let mut first_err = None;
        for t in transitions {
            let sent = self
                .factory
                .alert(&self.name, &t.message, t.severity, t.resolved, t.id.as_deref())
                .await;
            if let Err(e) = sent {
                warn!(chain = %self.name, resolved = t.resolved, "Failed to report alarm: {}", e);
                first_err.get_or_insert(MonitorError::from(e));
            }
        }
        self.active_alerts
            .store(self.evaluator.active_alerts(), Ordering::Relaxed);
        first_err.map_or(Ok(()), Err)
    }

    async fn push_initial_metrics(&self) {
        for url in &self.node_urls {
            self.send_metric(MetricKind::NodeDownSeconds, 0.0, Some(url.clone()))
                .await;
        }
    }

    async fn push_metrics(&mut self, status: &ChainStatus, now: DateTime<Utc>) {
        if self.metrics.is_none() {
            return;
        }
        if let Some(last) = status.last_block_time {
            let secs = seconds_between(now, last);
            self.send_metric(MetricKind::LastBlockSecondsNotFinal, secs, None)
                .await;
        }
        for node in &status.nodes {
            match node.down_since {
                Some(since) if node.down => {
                    self.nodes_reported_down.insert(node.url.clone());
                    let secs = seconds_between(now, since);
                    self.send_metric(MetricKind::NodeDownSeconds, secs, Some(node.url.clone()))
                        .await;
                }
                _ => {
                    // back up: reset the gauge once
                    if self.nodes_reported_down.remove(&node.url) {
                        self.send_metric(MetricKind::NodeDownSeconds, 0.0, Some(node.url.clone()))
                            .await;
                    }
                }
            }
        }
    }

    async fn send_metric(&self, kind: MetricKind, value: f64, node: Option<String>) {
        let Some(tx) = &self.metrics else {
            return;
        };
        let update = MetricUpdate::new(self.name.clone(), kind, value, node);
        if tx.send(update).await.is_err() {
            debug!(chain = %self.name, "Metrics queue closed, dropping sample");
        }
    }
}

fn seconds_between(now: DateTime<Utc>, since: DateTime<Utc>) -> f64 {
    now.signed_duration_since(since).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{NodeStatus, ValidatorInfo};
    use alerting::{
        AlertMessage, ChainAlertSettings, DashboardAlarms, NodeSettings, NotifySettings,
    };
    use std::collections::HashMap;

    const CHAIN: &str = "chainA";

    fn chain_settings() -> ChainSettings {
        ChainSettings {
            chain_id: "chain-a-1".to_string(),
            valoper_address: "valoper1abc".to_string(),
            alerts: ChainAlertSettings {
                consecutive_missed: 5,
                ..Default::default()
            },
            nodes: vec![NodeSettings {
                url: "tcp://10.0.0.1:26657".to_string(),
                alert_if_down: true,
            }],
        }
    }

    fn identified_status(settings: &ChainSettings) -> ChainStatus {
        let mut status = ChainStatus::from_settings(settings);
        status.validator = Some(ValidatorInfo {
            moniker: "validator-one".to_string(),
            valcons: "valcons1xyz".to_string(),
            missed: 0,
            window: 10_000,
        });
        status
    }

    fn monitor(
        status: SharedChainStatus,
    ) -> (ChainMonitor, mpsc::Receiver<AlertMessage>, Arc<DashboardAlarms>) {
        monitor_with(chain_settings(), status)
    }

    fn monitor_with(
        settings: ChainSettings,
        status: SharedChainStatus,
    ) -> (ChainMonitor, mpsc::Receiver<AlertMessage>, Arc<DashboardAlarms>) {
        let mut chains = HashMap::new();
        chains.insert(CHAIN.to_string(), settings.clone());
        let (tx, rx) = mpsc::channel(16);
        let dashboard = Arc::new(DashboardAlarms::new(false));
        let factory = Arc::new(AlertFactory::new(
            NotifySettings::default(),
            chains,
            tx,
            Arc::clone(&dashboard),
        ));
        (ChainMonitor::new(CHAIN, &settings, 10, status, factory), rx, dashboard)
    }

    fn drain(rx: &mut mpsc::Receiver<AlertMessage>) -> Vec<AlertMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_consecutive_sequence_reports_one_trigger_and_one_resolve() {
        let status = SharedChainStatus::new(identified_status(&chain_settings()));
        let (mut monitor, mut rx, dashboard) = monitor(status.clone());
        let active = monitor.active_alerts_handle();
        let now = Utc::now();

        let mut per_tick = Vec::new();
        for missed in [0u64, 2, 4, 5, 6, 7, 5, 4] {
            status.update(|s| s.consecutive_missed = missed);
            monitor.tick(now).await.unwrap();
            per_tick.push(drain(&mut rx));
            if missed == 6 {
                assert_eq!(active.load(Ordering::Relaxed), 1);
                assert_eq!(dashboard.active(CHAIN).len(), 1);
            }
        }

        let counts: Vec<_> = per_tick.iter().map(Vec::len).collect();
        assert_eq!(counts, vec![0, 0, 0, 1, 0, 0, 0, 1]);
        assert!(!per_tick[3][0].is_resolved());
        assert!(per_tick[7][0].is_resolved());
        assert_eq!(per_tick[3][0].unique_id(), "valcons1xyzconsecutive");
        assert_eq!(active.load(Ordering::Relaxed), 0);
        assert!(dashboard.active(CHAIN).is_empty());
    }

    #[tokio::test]
    async fn test_node_down_sends_metrics_and_resets() {
        let settings = chain_settings();
        let status = SharedChainStatus::new(identified_status(&settings));
        let (monitor, mut rx, _) = monitor(status.clone());
        let (metrics_tx, mut metrics_rx) = mpsc::channel(16);
        let mut monitor = monitor.with_metrics(metrics_tx);
        let now = Utc::now();

        status.update(|s| {
            s.nodes[0] = NodeStatus {
                url: "tcp://10.0.0.1:26657".to_string(),
                alert_if_down: true,
                down: true,
                down_since: Some(now - chrono::Duration::minutes(11)),
            };
        });
        monitor.tick(now).await.unwrap();

        let alerts = drain(&mut rx);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].unique_id(), "tcp://10.0.0.1:26657");
        let sample = metrics_rx.try_recv().unwrap();
        assert_eq!(sample.kind, MetricKind::NodeDownSeconds);
        assert!(sample.value >= 660.0);

        status.update(|s| {
            s.nodes[0].down = false;
            s.nodes[0].down_since = None;
        });
        monitor.tick(now).await.unwrap();

        let alerts = drain(&mut rx);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].is_resolved());
        let reset = metrics_rx.try_recv().unwrap();
        assert_eq!(reset.value, 0.0);
        assert_eq!(reset.node.as_deref(), Some("tcp://10.0.0.1:26657"));
    }

    #[tokio::test]
    async fn test_tick_reports_closed_queue() {
        let status = SharedChainStatus::new(identified_status(&chain_settings()));
        let (mut monitor, rx, _) = monitor(status.clone());
        drop(rx);

        status.update(|s| s.consecutive_missed = 9);
        let err = monitor.tick(Utc::now()).await.unwrap_err();
        assert!(matches!(err, MonitorError::Alert(alerting::AlertError::QueueClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_for_identity_then_stops() {
        let settings = chain_settings();
        let status = SharedChainStatus::new(ChainStatus {
            no_nodes: true,
            ..ChainStatus::from_settings(&settings)
        });
        let (monitor, mut rx, _) = monitor(status.clone());
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(stop_rx));

        // no-RPC alarm raised while waiting for the moniker
        let waiting = rx.recv().await.unwrap();
        assert_eq!(waiting.message(), "no RPC endpoints are working for chain-a-1");
        assert_eq!(waiting.unique_id(), "valoper1abc");

        status.update(|s| {
            *s = identified_status(&settings);
            s.consecutive_missed = 5;
        });
        let resolved = rx.recv().await.unwrap();
        assert!(resolved.is_resolved());
        let missed = rx.recv().await.unwrap();
        assert_eq!(missed.message(), "validator-one has missed 5 blocks on chain-a-1");

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_when_stop_sender_dropped() {
        let status = SharedChainStatus::new(identified_status(&chain_settings()));
        let (monitor, _rx, _) = monitor(status);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(stop_rx));

        drop(stop_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_pushes_zero_baseline_per_node() {
        let mut settings = chain_settings();
        settings.nodes.push(NodeSettings {
            url: "tcp://10.0.0.2:26657".to_string(),
            alert_if_down: false,
        });
        let status = SharedChainStatus::new(identified_status(&settings));
        let (monitor, _rx, _) = monitor_with(settings, status);
        let (metrics_tx, mut metrics_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.with_metrics(metrics_tx).run(stop_rx));

        let mut baseline = Vec::new();
        for _ in 0..2 {
            let sample = metrics_rx.recv().await.unwrap();
            assert_eq!(sample.kind, MetricKind::NodeDownSeconds);
            assert_eq!(sample.value, 0.0);
            baseline.push(sample.node.unwrap());
        }
        assert_eq!(baseline, vec!["tcp://10.0.0.1:26657", "tcp://10.0.0.2:26657"]);

        // healthy nodes and no block time yet: ticks add nothing
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(metrics_rx.try_recv().is_err());

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_ticking_after_false_stop_value() {
        let status = SharedChainStatus::new(identified_status(&chain_settings()));
        let (monitor, mut rx, _) = monitor(status.clone());
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(stop_rx));

        tokio::time::sleep(Duration::from_secs(3)).await;
        stop_tx.send(false).unwrap();
        status.update(|s| s.consecutive_missed = 5);

        let missed = rx.recv().await.unwrap();
        assert_eq!(missed.message(), "validator-one has missed 5 blocks on chain-a-1");
        assert!(!handle.is_finished());

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
