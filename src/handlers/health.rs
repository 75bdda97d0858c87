use crate::{middleware::AdmissionController, models::HealthStatus, services::database};
use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct HealthState {
    pub admission: Arc<AdmissionController>,
    pub started_at: Instant,
}

pub async fn health_check(State(state): State<HealthState>) -> Json<HealthStatus> {
    let database_ok = database::ping(state.admission.payments().pool()).await;
    let chain_ok = state.admission.chain().is_reachable().await;

    let status = if database_ok && chain_ok {
        "healthy"
    } else if database_ok {
        // Stored entitlements still gate events; only new payments stall.
        "degraded"
    } else {
        "unhealthy"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database_ok,
        chain_rpc: chain_ok,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    })
}
