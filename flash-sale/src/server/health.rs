//! Health check endpoint.

use super::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use flash_sale_runtime::HealthCheck;
use serde::Serialize;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always true when the server answers
    pub success: bool,
    /// Human-readable status
    pub message: String,
    /// Service status
    pub status: String,
    /// Server time
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server started
    pub uptime: f64,
    /// Service version
    pub version: String,
    /// Sale store health
    pub store: HealthCheck,
}

/// Health check endpoint.
///
/// Returns 200 OK while the sale store accepts actions and 503 once it is
/// shutting down.
///
/// # Example
///
/// ```bash
/// curl http://localhost:3001/api/health
/// # {"success":true,"message":"Flash Sale API is running","status":"ok",...}
/// ```
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = state.sale.health();
    let healthy = store.status.is_healthy();
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            success: healthy,
            message: if healthy {
                "Flash Sale API is running".to_string()
            } else {
                "Flash Sale API is shutting down".to_string()
            },
            status: store.status.to_string(),
            timestamp: Utc::now(),
            uptime: state.started_at.elapsed().as_secs_f64(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store,
        }),
    )
}
