//! Alarm Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::AppContext;

/// Response for the all-chains alarms endpoint
#[derive(Debug, Serialize)]
pub struct AlarmsResponse {
    /// True when alarm text is hidden from the dashboard
    pub hidden: bool,
    pub alarms: BTreeMap<String, Vec<String>>,
}

/// Active alarms for one chain as a text block
pub async fn get_chain_alarms(
    State(ctx): State<Arc<AppContext>>,
    Path(chain): Path<String>,
) -> Result<String, StatusCode> {
    if !ctx.chains.contains_key(&chain) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(ctx.dashboard.get_alarms(&chain))
}

/// Active alarms for every chain
pub async fn get_all_alarms(State(ctx): State<Arc<AppContext>>) -> Json<AlarmsResponse> {
    Json(AlarmsResponse {
        hidden: ctx.dashboard.hide_logs(),
        alarms: ctx.dashboard.snapshot(),
    })
}
