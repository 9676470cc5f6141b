//! HTTP API routes and handlers.
//!
//! Handlers are grouped by concern:
//! - `health` - Service health checks
//! - `session` - Whole-session snapshot and error dismissal
//! - `countries` - Country list
//! - `selection` - Country and date range selection
//! - `statistics` - Case deltas
//! - `scan` - Bluetooth proximity scans
//! - `config` - Active configuration
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod config;
pub mod countries;
pub mod error;
pub mod health;
pub mod openapi;
pub mod scan;
pub mod selection;
pub mod session;
pub mod statistics;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                   - Health check
/// /api
/// ├── /session              - Snapshot (GET), dismiss error (DELETE /error)
/// ├── /countries            - List (GET), reload (POST /refresh)
/// ├── /selection            - Country (PUT /country), dates (PUT /range)
/// ├── /statistics           - Last delta (GET), fetch (POST)
/// ├── /scan                 - Session (GET), run (POST), stop (DELETE)
/// ├── /config               - Active configuration
/// └── /openapi.json         - OpenAPI specification
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/session", session::router())
                .nest("/countries", countries::router())
                .nest("/selection", selection::router())
                .nest("/statistics", statistics::router())
                .nest("/scan", scan::router())
                .nest("/config", config::router()),
        )
        .with_state(state)
}
