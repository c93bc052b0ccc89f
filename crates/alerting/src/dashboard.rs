//! Dashboard alarm registry

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

/// Per-chain set of currently active alarm texts, kept for display only.
///
/// Independent of delivery: an alarm shows up here even if every sink
/// failed to deliver it.
#[derive(Debug, Default)]
pub struct DashboardAlarms {
    hide_logs: bool,
    alarms: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl DashboardAlarms {
    /// Create a registry; `hide_logs` blanks every query
    pub fn new(hide_logs: bool) -> Self {
        Self {
            hide_logs,
            alarms: RwLock::new(HashMap::new()),
        }
    }

    pub fn hide_logs(&self) -> bool {
        self.hide_logs
    }

    /// Apply one alert call: add on trigger, remove on resolution
    pub fn record(&self, chain: &str, message: &str, resolved: bool) {
        let mut alarms = self.alarms.write().unwrap_or_else(PoisonError::into_inner);
        if resolved {
            if let Some(active) = alarms.get_mut(chain) {
                active.remove(message);
                if active.is_empty() {
                    alarms.remove(chain);
                }
            }
            return;
        }
        alarms
            .entry(chain.to_string())
            .or_default()
            .insert(message.to_string());
    }

    /// Text block of active alarms for `chain`, one line per alarm.
    ///
    /// Always empty when logs are hidden on the dashboard, since alarm
    /// text can leak node URLs and validator identities.
    pub fn get_alarms(&self, chain: &str) -> String {
        self.active(chain)
            .iter()
            .map(|alarm| format!("🚨 {}\n", alarm))
            .collect()
    }

    /// Active alarm texts for `chain`, sorted
    pub fn active(&self, chain: &str) -> Vec<String> {
        if self.hide_logs {
            return Vec::new();
        }
        let alarms = self.alarms.read().unwrap_or_else(PoisonError::into_inner);
        alarms
            .get(chain)
            .map(|active| active.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All chains with at least one active alarm
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        if self.hide_logs {
            return BTreeMap::new();
        }
        let alarms = self.alarms.read().unwrap_or_else(PoisonError::into_inner);
        alarms
            .iter()
            .map(|(chain, active)| (chain.clone(), active.iter().cloned().collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_then_resolve() {
        let dashboard = DashboardAlarms::new(false);
        dashboard.record("chainA", "stalled", false);
        dashboard.record("chainA", "node down", false);
        assert_eq!(dashboard.get_alarms("chainA"), "🚨 node down\n🚨 stalled\n");

        dashboard.record("chainA", "stalled", true);
        assert_eq!(dashboard.active("chainA"), vec!["node down".to_string()]);
    }

    #[test]
    fn test_resolve_unknown_is_noop() {
        let dashboard = DashboardAlarms::new(false);
        dashboard.record("chainA", "stalled", true);
        assert_eq!(dashboard.get_alarms("chainA"), "");
        assert!(dashboard.snapshot().is_empty());
    }

    #[test]
    fn test_hide_logs_blanks_output() {
        let dashboard = DashboardAlarms::new(true);
        dashboard.record("chainA", "stalled", false);

        assert_eq!(dashboard.get_alarms("chainA"), "");
        assert!(dashboard.active("chainA").is_empty());
        assert!(dashboard.snapshot().is_empty());
    }

    #[test]
    fn test_chains_are_separate() {
        let dashboard = DashboardAlarms::new(false);
        dashboard.record("chainA", "stalled", false);
        dashboard.record("chainB", "stalled", false);
        dashboard.record("chainA", "stalled", true);

        assert_eq!(dashboard.get_alarms("chainA"), "");
        assert_eq!(dashboard.get_alarms("chainB"), "🚨 stalled\n");
    }
}
