//! Liveness and dependency health.
//!
//! PostgreSQL down means not serving (503). Redis is optional, so a failed
//! ping only degrades the report.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// `ok`, `degraded` or `unavailable`.
    pub status: &'static str,
    pub database: bool,
    /// `None` when Redis is not configured.
    pub redis: Option<bool>,
    pub server_time: DateTime<Utc>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let database = state.db.health_check().await;
    let redis = match &state.cache {
        Some(cache) => Some(cache.ping().await),
        None => None,
    };

    let (code, status) = if !database {
        warn!("Health check: database unreachable");
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else if redis == Some(false) {
        warn!("Health check: Redis unreachable");
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        code,
        Json(HealthReport {
            status,
            database,
            redis,
            server_time: Utc::now(),
        }),
    )
}
