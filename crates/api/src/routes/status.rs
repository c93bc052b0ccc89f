//! Status Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chain_monitor::StatusReport;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::AppContext;

/// Replace a chain's statistics with a poller report
pub async fn put_chain_status(
    State(ctx): State<Arc<AppContext>>,
    Path(chain): Path<String>,
    Json(report): Json<StatusReport>,
) -> StatusCode {
    let Some(handle) = ctx.chains.get(&chain) else {
        return StatusCode::NOT_FOUND;
    };
    let unknown = handle.status.update(|status| status.apply_report(report));
    if unknown > 0 {
        warn!(chain = %chain, "Ignored {} unconfigured nodes in status report", unknown);
    }
    debug!(chain = %chain, "Status report applied");
    StatusCode::NO_CONTENT
}
