//! Configuration endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// Creates the config router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_config))
}

/// Active configuration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "api_base_url": "https://api.covid19api.com",
    "api_timeout_secs": 15,
    "target_address": "64:E8:CE:FF:34:4E",
    "scan_duration_ms": 5000
}))]
pub struct ConfigResponse {
    /// Statistics API base URL.
    pub api_base_url: String,

    /// Statistics API request timeout.
    pub api_timeout_secs: u64,

    /// Bluetooth address scans look for.
    pub target_address: String,

    /// Scan window in milliseconds.
    pub scan_duration_ms: u64,
}

/// Read the active configuration.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    operation_id = "getConfig",
    summary = "Get configuration",
    description = "Returns the statistics API and scan settings the server \
        was started with.",
    responses(
        (status = 200, description = "Active configuration", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = state.config();
    let scan = state.session().scan_config();
    Json(ConfigResponse {
        api_base_url: config.api.base_url.clone(),
        api_timeout_secs: config.api.timeout_secs,
        target_address: scan.target_address.clone(),
        scan_duration_ms: scan.duration_ms,
    })
}
