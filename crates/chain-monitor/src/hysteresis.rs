//! Edge-triggered alarm evaluation
//!
//! Each alarm fires once when its condition is entered and resolves once
//! when it is left. The evaluator remembers the exact text and id it
//! fired with so the resolution always matches the trigger, even if the
//! moniker changes while the alarm is active.

use crate::status::ChainStatus;
use alerting::{ChainAlertSettings, Severity};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Alarm conditions tracked per chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlarmKind {
    /// No RPC endpoint reachable
    NoRpc,
    /// No new block within the stall threshold
    Stalled,
    /// Consecutive missed blocks at or above threshold
    ConsecutiveMissed,
    /// Missed share of the slashing window above threshold
    WindowMissed,
    /// A node has been down longer than the minimum, keyed by URL
    NodeDown(String),
}

/// One alarm edge to report through the alert factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub kind: AlarmKind,
    pub message: String,
    pub severity: Severity,
    pub resolved: bool,
    /// Unique id override; `None` falls back to the chain default
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
struct ActiveAlarm {
    message: String,
    severity: Severity,
    id: Option<String>,
}

/// Private hysteresis memory, owned by a single monitor
#[derive(Debug, Default)]
struct HysteresisState {
    no_nodes: Option<ActiveAlarm>,
    last_block_alarm: Option<ActiveAlarm>,
    missed_alarm: Option<ActiveAlarm>,
    pct_alarm: Option<ActiveAlarm>,
    node_alarms: HashMap<String, ActiveAlarm>,
    active_alerts: usize,
}

/// Derives alarm transitions from successive chain status samples
#[derive(Debug)]
pub struct AlarmEvaluator {
    chain_id: String,
    alerts: ChainAlertSettings,
    node_down_minutes: u64,
    state: HysteresisState,
}

impl AlarmEvaluator {
    pub fn new(chain_id: impl Into<String>, alerts: ChainAlertSettings, node_down_minutes: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            alerts,
            node_down_minutes,
            state: HysteresisState::default(),
        }
    }

    /// Number of alarms currently in the triggered state
    pub fn active_alerts(&self) -> usize {
        self.state.active_alerts
    }

    pub fn is_active(&self, kind: &AlarmKind) -> bool {
        match kind {
            AlarmKind::NoRpc => self.state.no_nodes.is_some(),
            AlarmKind::Stalled => self.state.last_block_alarm.is_some(),
            AlarmKind::ConsecutiveMissed => self.state.missed_alarm.is_some(),
            AlarmKind::WindowMissed => self.state.pct_alarm.is_some(),
            AlarmKind::NodeDown(url) => self.state.node_alarms.contains_key(url),
        }
    }

    /// Evaluate every condition for one tick.
    ///
    /// Order is fixed: no-RPC, stalled, consecutive, percentage, nodes.
    pub fn evaluate(&mut self, status: &ChainStatus, now: DateTime<Utc>) -> Vec<Transition> {
        let mut transitions = Vec::new();
        transitions.extend(self.check_no_rpc(status));
        transitions.extend(self.check_stalled(status, now));
        transitions.extend(self.check_consecutive(status));
        transitions.extend(self.check_window(status));
        transitions.extend(self.check_nodes(status, now));
        transitions
    }

    /// No reachable RPC endpoint. Also used while waiting for identity.
    pub fn check_no_rpc(&mut self, status: &ChainStatus) -> Option<Transition> {
        if !self.alerts.alert_if_no_servers {
            return None;
        }
        let active = self.is_active(&AlarmKind::NoRpc);
        if !active && status.no_nodes {
            let message = format!("no RPC endpoints are working for {}", self.chain_id);
            let id = status.valcons().map(str::to_string);
            Some(self.trigger(AlarmKind::NoRpc, message, Severity::Critical, id))
        } else if active && !status.no_nodes {
            self.clear(AlarmKind::NoRpc)
        } else {
            None
        }
    }

    fn check_stalled(&mut self, status: &ChainStatus, now: DateTime<Utc>) -> Option<Transition> {
        if !self.alerts.stalled_enabled {
            return None;
        }
        let active = self.is_active(&AlarmKind::Stalled);
        match status.last_block_time {
            Some(last) if !active && exceeds_minutes(now, last, self.alerts.stalled_minutes) => {
                let message = format!(
                    "stalled: have not seen a new block on {} in {} minutes",
                    self.chain_id, self.alerts.stalled_minutes
                );
                let id = status.valcons().map(str::to_string);
                Some(self.trigger(AlarmKind::Stalled, message, Severity::Critical, id))
            }
            None if active => self.clear(AlarmKind::Stalled),
            _ => None,
        }
    }

    fn check_consecutive(&mut self, status: &ChainStatus) -> Option<Transition> {
        let validator = status.validator.as_ref()?;
        let threshold = self.alerts.consecutive_missed;
        let active = self.is_active(&AlarmKind::ConsecutiveMissed);

        if !active && self.alerts.consecutive_enabled && status.consecutive_missed >= threshold {
            let message = format!(
                "{} has missed {} blocks on {}",
                validator.moniker, threshold, self.chain_id
            );
            let id = Some(format!("{}consecutive", validator.valcons));
            let severity = self.alerts.consecutive_priority;
            Some(self.trigger(AlarmKind::ConsecutiveMissed, message, severity, id))
        } else if active && status.consecutive_missed < threshold {
            self.clear(AlarmKind::ConsecutiveMissed)
        } else {
            None
        }
    }

    fn check_window(&mut self, status: &ChainStatus) -> Option<Transition> {
        let validator = status.validator.as_ref()?;
        if !self.alerts.percentage_enabled || validator.window <= 0 {
            return None;
        }
        let missed_pct = 100.0 * validator.missed as f64 / validator.window as f64;
        let threshold = f64::from(self.alerts.window_percent);
        let active = self.is_active(&AlarmKind::WindowMissed);

        if !active && missed_pct > threshold {
            let message = format!(
                "{} has missed > {}% of the slashing window's blocks on {}",
                validator.moniker, self.alerts.window_percent, self.chain_id
            );
            let id = Some(format!("{}percent", validator.valcons));
            let severity = self.alerts.percentage_priority;
            Some(self.trigger(AlarmKind::WindowMissed, message, severity, id))
        } else if active && missed_pct < threshold {
            self.clear(AlarmKind::WindowMissed)
        } else {
            None
        }
    }

    fn check_nodes(&mut self, status: &ChainStatus, now: DateTime<Utc>) -> Vec<Transition> {
        let mut transitions = Vec::new();
        for node in &status.nodes {
            let kind = AlarmKind::NodeDown(node.url.clone());
            let active = self.is_active(&kind);
            match node.down_since {
                Some(since)
                    if node.alert_if_down
                        && node.down
                        && !active
                        && exceeds_minutes(now, since, self.node_down_minutes) =>
                {
                    let message = format!(
                        "RPC node {} has been down for > {} minutes on {}",
                        node.url, self.node_down_minutes, self.chain_id
                    );
                    let id = Some(node.url.clone());
                    transitions.push(self.trigger(kind, message, Severity::Critical, id));
                }
                None if active => transitions.extend(self.clear(kind)),
                _ => {}
            }
        }
        transitions
    }

    fn trigger(
        &mut self,
        kind: AlarmKind,
        message: String,
        severity: Severity,
        id: Option<String>,
    ) -> Transition {
        let alarm = ActiveAlarm {
            message: message.clone(),
            severity,
            id: id.clone(),
        };
        match &kind {
            AlarmKind::NoRpc => self.state.no_nodes = Some(alarm),
            AlarmKind::Stalled => self.state.last_block_alarm = Some(alarm),
            AlarmKind::ConsecutiveMissed => self.state.missed_alarm = Some(alarm),
            AlarmKind::WindowMissed => self.state.pct_alarm = Some(alarm),
            AlarmKind::NodeDown(url) => {
                self.state.node_alarms.insert(url.clone(), alarm);
            }
        }
        self.state.active_alerts += 1;
        Transition {
            kind,
            message,
            severity,
            resolved: false,
            id,
        }
    }

    fn clear(&mut self, kind: AlarmKind) -> Option<Transition> {
        let alarm = match &kind {
            AlarmKind::NoRpc => self.state.no_nodes.take(),
            AlarmKind::Stalled => self.state.last_block_alarm.take(),
            AlarmKind::ConsecutiveMissed => self.state.missed_alarm.take(),
            AlarmKind::WindowMissed => self.state.pct_alarm.take(),
            AlarmKind::NodeDown(url) => self.state.node_alarms.remove(url),
        }?;
        self.state.active_alerts = self.state.active_alerts.saturating_sub(1);
        Some(Transition {
            kind,
            message: alarm.message,
            severity: alarm.severity,
            resolved: true,
            id: alarm.id,
        })
    }
}

/// Strictly more than `minutes` have passed between `since` and `now`
fn exceeds_minutes(now: DateTime<Utc>, since: DateTime<Utc>, minutes: u64) -> bool {
    let limit = i64::try_from(minutes.saturating_mul(60)).unwrap_or(i64::MAX);
    now.signed_duration_since(since).num_seconds() > limit
}
