//! Outbound queue consumer

use crate::error::NotifyError;
use crate::sink::Sink;
use alerting::{AlertMessage, DedupRegistry, Destination};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound for a single delivery (default: 30s)
    pub delivery_timeout: Duration,
    /// Per-sink queue capacity; alerts for a sink whose queue is full
    /// are dropped for that sink only
    pub sink_queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(30),
            sink_queue_capacity: 32,
        }
    }
}

/// Forward `msg` to `sink` if enabled and not a duplicate.
///
/// Returns `Ok(true)` when a delivery was made. The dedup mark is set
/// before delivery and is not rolled back on failure.
pub async fn notify(
    sink: &dyn Sink,
    registry: &DedupRegistry,
    msg: &AlertMessage,
    timeout: Duration,
) -> Result<bool, NotifyError> {
    let dest = sink.destination();
    if !msg.enabled_for(dest) {
        return Ok(false);
    }
    if !registry.should_notify(msg, dest) {
        return Ok(false);
    }

    match tokio::time::timeout(timeout, sink.deliver(msg)).await {
        Ok(delivered) => delivered.map(|_| true),
        Err(_) => Err(NotifyError::Timeout {
            service: dest.service_name(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Consumes the outbound alert queue and fans messages out to sinks
pub struct Dispatcher {
    registry: Arc<DedupRegistry>,
    sinks: Vec<Arc<dyn Sink>>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<DedupRegistry>, config: DispatcherConfig) -> Self {
        Self {
            registry,
            sinks: Vec::new(),
            config,
        }
    }

    /// Register a sink; one worker task is started for it on `run`
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Run until every alert producer has dropped its sender, then wait
    /// for the sink workers to drain.
    ///
    /// Fan-out never waits on a sink: a stalled sink loses alerts once its
    /// queue is full while the other sinks keep receiving them.
    pub async fn run(self, mut rx: mpsc::Receiver<AlertMessage>) {
        info!("Starting alert dispatcher with {} sinks", self.sinks.len());

        let mut routes: Vec<(Destination, mpsc::Sender<AlertMessage>)> = Vec::new();
        let mut workers = Vec::new();
        for sink in self.sinks {
            let (tx, sink_rx) = mpsc::channel(self.config.sink_queue_capacity);
            routes.push((sink.destination(), tx));
            workers.push(tokio::spawn(sink_worker(
                sink,
                Arc::clone(&self.registry),
                sink_rx,
                self.config.delivery_timeout,
            )));
        }

        while let Some(msg) = rx.recv().await {
            for (dest, tx) in &routes {
                if !msg.enabled_for(*dest) {
                    continue;
                }
                match tx.try_send(msg.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(dropped)) => warn!(
                        chain = dropped.chain(),
                        destination = %dest,
                        resolved = dropped.is_resolved(),
                        "Sink queue full, dropping alert"
                    ),
                    Err(TrySendError::Closed(_)) => {
                        warn!(destination = %dest, "Sink worker gone, dropping alert")
                    }
                }
            }
        }

        drop(routes);
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Sink worker panicked: {}", e);
            }
        }
        info!("Alert dispatcher stopped");
    }
}

async fn sink_worker(
    sink: Arc<dyn Sink>,
    registry: Arc<DedupRegistry>,
    mut rx: mpsc::Receiver<AlertMessage>,
    timeout: Duration,
) {
    let dest = sink.destination();
    while let Some(msg) = rx.recv().await {
        match notify(sink.as_ref(), &registry, &msg, timeout).await {
            Ok(true) => debug!(chain = msg.chain(), destination = %dest, "Notification delivered"),
            Ok(false) => {}
            Err(NotifyError::InvalidCredentials(reason)) => {
                warn!(chain = msg.chain(), destination = %dest, "Skipping sink: {}", reason)
            }
            Err(e) => warn!(chain = msg.chain(), destination = %dest, "notify {}: {}", dest, e),
        }
    }
}
