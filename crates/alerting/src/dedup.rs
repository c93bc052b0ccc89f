//! Per-destination alert deduplication

use crate::message::{AlertMessage, Destination};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Active alarm keys, one set per destination
#[derive(Debug, Default)]
struct SentAlarms {
    pagerduty: HashSet<String>,
    telegram: HashSet<String>,
    discord: HashSet<String>,
}

impl SentAlarms {
    fn for_destination(&mut self, dest: Destination) -> &mut HashSet<String> {
        match dest {
            Destination::PagerDuty => &mut self.pagerduty,
            Destination::Telegram => &mut self.telegram,
            Destination::Discord => &mut self.discord,
        }
    }
}

/// Registry deciding whether an alert should be forwarded to a destination.
///
/// A key is present for a destination iff a trigger for that message
/// text was forwarded there and no resolution has followed. All three
/// sets share one mutex; it is only held for the check-and-mark, never
/// across delivery.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    sent: Mutex<SentAlarms>,
}

impl DedupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the sets consistent, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, SentAlarms> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check and mark an alert for `dest`.
    ///
    /// Repeated triggers are suppressed; resolutions always pass.
    pub fn should_notify(&self, msg: &AlertMessage, dest: Destination) -> bool {
        let mut sent = self.lock();
        let active = sent.for_destination(dest);
        let key = msg.message();

        if active.contains(key) {
            if !msg.is_resolved() {
                debug!(chain = msg.chain(), destination = %dest, "Alert suppressed: already sent");
                return false;
            }
            active.remove(key);
            info!(
                "💜 Resolved     alarm on {} ({}) - notifying {}",
                msg.chain(),
                key,
                dest
            );
            return true;
        }

        if msg.is_resolved() {
            debug!(
                chain = msg.chain(),
                destination = %dest,
                "Forwarding resolution for an alarm that was never sent"
            );
            return true;
        }

        active.insert(key.to_owned());
        info!(
            "🚨 ALERT        new alarm on {} ({}) - notifying {}",
            msg.chain(),
            key,
            dest
        );
        true
    }

    /// Whether `message` is currently marked active for `dest`
    pub fn is_active(&self, message: &str, dest: Destination) -> bool {
        self.lock().for_destination(dest).contains(message)
    }

    /// Number of active alarms for `dest`
    pub fn active_count(&self, dest: Destination) -> usize {
        self.lock().for_destination(dest).len()
    }
}
