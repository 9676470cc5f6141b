//! Proximity scan endpoints.
//!
//! A scan looks for advertisements from the configured target address for
//! the configured window. `POST /api/scan` waits for the outcome;
//! `DELETE /api/scan` ends a running scan early.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use exposure_core::ScanSession;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::AppState;

/// Creates the scan router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_scan).post(start_scan).delete(stop_scan))
}

/// Result of a stop request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StopScanResponse {
    /// Whether a running scan was ended by this request.
    #[schema(example = true)]
    pub stopped: bool,

    /// Session after the request.
    pub session: ScanSession,
}

/// Current or last scan session.
#[utoipa::path(
    get,
    path = "/api/scan",
    tag = "scan",
    operation_id = "getScan",
    summary = "Get scan session",
    responses(
        (status = 200, description = "Current scan session", body = ScanSession)
    )
)]
pub async fn get_scan(State(state): State<AppState>) -> Json<ScanSession> {
    Json(state.session().snapshot().scan)
}

/// Scan for the configured target.
#[utoipa::path(
    post,
    path = "/api/scan",
    tag = "scan",
    operation_id = "startScan",
    summary = "Run a proximity scan",
    description = "Scans for the configured Bluetooth address and responds \
        once the scan resolves: `found` when the target advertised, \
        `not_found` when the window elapsed or the scan was stopped, \
        `failed` with an adapter code when the radio reported an error.",
    responses(
        (status = 200, description = "Scan resolved", body = ScanSession),
        (status = 409, description = "A scan is already running", body = ErrorResponse),
        (status = 422, description = "Configured target is invalid", body = ErrorResponse),
        (status = 503, description = "The scan task ended without resolving", body = ErrorResponse)
    )
)]
pub async fn start_scan(State(state): State<AppState>) -> ApiResult<Json<ScanSession>> {
    let outcome = state.session().start_proximity_scan().await?;
    info!(?outcome, "Proximity scan resolved");
    Ok(Json(state.session().snapshot().scan))
}

/// Stop the running scan.
#[utoipa::path(
    delete,
    path = "/api/scan",
    tag = "scan",
    operation_id = "stopScan",
    summary = "Stop the running scan",
    description = "Ends a running scan as `not_found`. Does nothing when no \
        scan is running.",
    responses(
        (status = 200, description = "Stop processed", body = StopScanResponse)
    )
)]
pub async fn stop_scan(State(state): State<AppState>) -> Json<StopScanResponse> {
    let stopped = state.session().stop_proximity_scan();
    Json(StopScanResponse {
        stopped,
        session: state.session().snapshot().scan,
    })
}
