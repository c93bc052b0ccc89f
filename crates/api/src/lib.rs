//! Validator Alerting Daemon
//!
//! Wires the chain monitors, the alert factory and the notification
//! dispatcher together, and serves the dashboard endpoints.

use alerting::{AlertFactory, DashboardAlarms, DedupRegistry, Destination};
use anyhow::Context;
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use chain_monitor::{record_metrics, ChainMonitor, ChainStatus, SharedChainStatus};
use metrics_exporter_prometheus::PrometheusBuilder;
use notifier::{DiscordSink, Dispatcher, DispatcherConfig, PagerDutySink, TelegramSink};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod routes;
pub mod settings;

use settings::{LogFormat, Settings};

/// How long shutdown waits for queued notifications to drain
const DRAIN_TIMEOUT: Duration = Duration::from_secs(35);

/// Per-chain handles shared with the dashboard and the RPC poller
#[derive(Debug, Clone)]
pub struct ChainHandle {
    /// Status written by the RPC poller, read by the chain monitor
    pub status: SharedChainStatus,
    /// Active alarm count published by the chain monitor
    pub active_alerts: Arc<AtomicUsize>,
}

/// Process-wide context, built once at startup
pub struct AppContext {
    pub dashboard: Arc<DashboardAlarms>,
    pub dedup: Arc<DedupRegistry>,
    pub chains: BTreeMap<String, ChainHandle>,
    pub version: String,
    pub start_time: Instant,
}

impl AppContext {
    pub fn new(
        dashboard: Arc<DashboardAlarms>,
        dedup: Arc<DedupRegistry>,
        chains: BTreeMap<String, ChainHandle>,
    ) -> Self {
        Self {
            dashboard,
            dedup,
            chains,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub chains: BTreeMap<String, ChainHealth>,
    /// Alarms currently marked as sent, per destination
    pub notified: BTreeMap<&'static str, usize>,
}

/// Per-chain health summary
#[derive(Debug, Serialize)]
pub struct ChainHealth {
    pub active_alerts: usize,
    pub identified: bool,
    pub no_nodes: bool,
}

/// Create the application router
pub fn create_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/alarms", get(routes::alarms::get_all_alarms))
        .route("/api/v1/alarms/:chain", get(routes::alarms::get_chain_alarms))
        .route("/api/v1/status/:chain", put(routes::status::put_chain_status))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Health check handler
async fn health_handler(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    let chains = ctx
        .chains
        .iter()
        .map(|(name, handle)| {
            let status = handle.status.snapshot();
            let health = ChainHealth {
                active_alerts: handle.active_alerts.load(Ordering::Relaxed),
                identified: status.is_identified(),
                no_nodes: status.no_nodes,
            };
            (name.clone(), health)
        })
        .collect();
    let notified = Destination::ALL
        .iter()
        .map(|dest| (dest.service_name(), ctx.dedup.active_count(*dest)))
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: ctx.version.clone(),
        uptime_seconds: ctx.start_time.elapsed().as_secs(),
        chains,
        notified,
    })
}

/// Initialize logging; `RUST_LOG` overrides the default `info` level
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
    };
    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Status handles for every configured chain.
///
/// Hand these to the RPC poller before calling [`run`]; the poller can
/// also push reports through `PUT /api/v1/status/:chain`.
pub fn chain_statuses(settings: &Settings) -> BTreeMap<String, SharedChainStatus> {
    settings
        .chains
        .iter()
        .map(|(name, chain)| {
            let status = SharedChainStatus::new(ChainStatus::from_settings(chain));
            (name.clone(), status)
        })
        .collect()
}

/// Run the daemon until Ctrl-C, monitoring the chains whose status is
/// written through `statuses`
pub async fn run(
    settings: Settings,
    mut statuses: BTreeMap<String, SharedChainStatus>,
) -> anyhow::Result<()> {
    let dashboard = Arc::new(DashboardAlarms::new(settings.hide_logs));
    let dedup = Arc::new(DedupRegistry::new());
    let (alert_tx, alert_rx) = mpsc::channel(settings.alert_queue_capacity);
    let factory = Arc::new(AlertFactory::new(
        settings.notify_settings(),
        settings.chains.clone(),
        alert_tx,
        Arc::clone(&dashboard),
    ));

    let dispatcher_config = DispatcherConfig::default();
    let client = reqwest::Client::builder()
        .timeout(dispatcher_config.delivery_timeout)
        .build()
        .context("building HTTP client")?;
    let mut dispatcher = Dispatcher::new(Arc::clone(&dedup), dispatcher_config);
    if settings.pagerduty.enabled {
        dispatcher = dispatcher.with_sink(Arc::new(PagerDutySink::new(client.clone())));
    }
    if settings.telegram.enabled {
        dispatcher = dispatcher.with_sink(Arc::new(TelegramSink::new(client.clone())));
    }
    if settings.discord.enabled {
        dispatcher = dispatcher.with_sink(Arc::new(DiscordSink::new(client)));
    }
    if dispatcher.sink_count() == 0 {
        warn!("No notification sinks enabled; alarms will only appear on the dashboard");
    }
    let dispatcher_handle = tokio::spawn(dispatcher.run(alert_rx));

    let metrics_tx = if settings.prometheus.enabled {
        let addr: SocketAddr = settings
            .prometheus
            .listen
            .parse()
            .context("parsing prometheus listen address")?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing prometheus exporter")?;
        info!("Prometheus exporter listening on {}", addr);
        let (tx, rx) = mpsc::channel(settings.metrics_queue_capacity);
        tokio::spawn(record_metrics(rx));
        Some(tx)
    } else {
        None
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut chains = BTreeMap::new();
    let mut monitors = Vec::new();
    for (name, chain) in &settings.chains {
        let status = statuses.remove(name).unwrap_or_else(|| {
            warn!(chain = %name, "No status handle supplied, chain will wait for reports");
            SharedChainStatus::new(ChainStatus::from_settings(chain))
        });
        let mut monitor = ChainMonitor::new(
            name.clone(),
            chain,
            settings.node_down_alert_minutes,
            status.clone(),
            Arc::clone(&factory),
        );
        if let Some(tx) = &metrics_tx {
            monitor = monitor.with_metrics(tx.clone());
        }
        chains.insert(
            name.clone(),
            ChainHandle {
                status,
                active_alerts: monitor.active_alerts_handle(),
            },
        );
        monitors.push(tokio::spawn(monitor.run(stop_rx.clone())));
    }
    // monitors own the only remaining senders
    drop(factory);
    drop(metrics_tx);

    let ctx = Arc::new(AppContext::new(dashboard, dedup, chains));
    if settings.dashboard.enabled {
        let listener = tokio::net::TcpListener::bind(settings.dashboard.listen.as_str())
            .await
            .with_context(|| format!("binding dashboard to {}", settings.dashboard.listen))?;
        info!("Dashboard listening on {}", settings.dashboard.listen);
        let app = create_router(Arc::clone(&ctx));
        let mut shutdown = stop_rx.clone();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.changed().await;
                })
                .await;
            if let Err(e) = served {
                warn!("Dashboard server failed: {}", e);
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutting down");
    let _ = stop_tx.send(true);

    for monitor in monitors {
        if let Err(e) = monitor.await {
            warn!("Chain monitor task failed: {}", e);
        }
    }
    if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher_handle).await.is_err() {
        warn!("Timed out draining notification queue");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chain_monitor::ValidatorInfo;
    use tower::ServiceExt;

    pub(crate) fn context(hide_logs: bool) -> Arc<AppContext> {
        let dashboard = Arc::new(DashboardAlarms::new(hide_logs));
        let status = SharedChainStatus::default();
        status.update(|s| {
            s.validator = Some(ValidatorInfo {
                moniker: "validator-one".to_string(),
                ..Default::default()
            })
        });
        let mut chains = BTreeMap::new();
        chains.insert(
            "chainA".to_string(),
            ChainHandle {
                status,
                active_alerts: Arc::new(AtomicUsize::new(2)),
            },
        );
        Arc::new(AppContext::new(dashboard, Arc::new(DedupRegistry::new()), chains))
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(context(false));
        let resp = app
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["chains"]["chainA"]["active_alerts"], 2);
        assert_eq!(json["chains"]["chainA"]["identified"], true);
        assert_eq!(json["notified"]["PagerDuty"], 0);
    }

    #[test]
    fn test_chain_statuses_cover_configured_nodes() {
        let settings = Settings::from_yaml(
            r#"
chains:
  osmosis:
    chain_id: osmosis-1
    nodes:
      - url: tcp://10.0.0.1:26657
"#,
        )
        .unwrap();

        let statuses = chain_statuses(&settings);
        let osmosis = statuses["osmosis"].snapshot();
        assert!(!osmosis.is_identified());
        assert_eq!(osmosis.nodes[0].url, "tcp://10.0.0.1:26657");
    }
}
