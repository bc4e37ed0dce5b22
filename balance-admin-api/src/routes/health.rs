/// Liveness and health endpoints
///
/// # Endpoints
///
/// ```text
/// GET /         # process is up, no database access
/// GET /health   # database reachability and pool usage
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use balance_admin_shared::db::pool::{get_pool_stats, health_check as ping_database};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness response
#[derive(Debug, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,

    pub message: String,

    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    /// Application version
    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    pub pool: PoolResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolResponse {
    pub active: usize,
    pub idle: usize,
    pub total: usize,
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok".to_string(),
        message: "Backend server is running successfully.".to_string(),
        timestamp: Utc::now(),
    })
}

/// Health check handler
///
/// Always answers 200; a failed ping shows up as `degraded`.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let connected = match ping_database(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    let stats = get_pool_stats(&state.db);

    Ok(Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        pool: PoolResponse {
            active: stats.active_connections,
            idle: stats.idle_connections,
            total: stats.total_connections,
        },
    }))
}
