//! Case statistics endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use exposure_core::{CaseDelta, DateRange};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::AppState;

/// Creates the statistics router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_statistics).post(fetch_statistics))
}

/// Last computed statistics.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "case_delta": { "country": "Israel", "confirmed": 15, "deaths": 0, "recovered": 4 },
    "range": { "from": "2021-03-01", "to": "2021-03-05" }
}))]
pub struct StatisticsResponse {
    /// Case changes from the last successful fetch.
    pub case_delta: Option<CaseDelta>,

    /// The selected range, if both ends are set.
    pub range: Option<DateRange>,
}

/// Read the last computed statistics.
#[utoipa::path(
    get,
    path = "/api/statistics",
    tag = "statistics",
    operation_id = "getStatistics",
    summary = "Get last statistics",
    description = "Returns the case delta from the last successful fetch \
        without contacting the statistics API.",
    responses(
        (status = 200, description = "Last statistics", body = StatisticsResponse)
    )
)]
pub async fn get_statistics(State(state): State<AppState>) -> Json<StatisticsResponse> {
    let snapshot = state.session().snapshot();
    Json(StatisticsResponse {
        range: snapshot.date_range(),
        case_delta: snapshot.case_delta,
    })
}

/// Fetch statistics for the selected country and date range.
#[utoipa::path(
    post,
    path = "/api/statistics",
    tag = "statistics",
    operation_id = "fetchStatistics",
    summary = "Fetch statistics",
    description = "Downloads the daily series for the selected country over \
        the selected range and returns the change between its first and last \
        day.",
    responses(
        (status = 200, description = "Statistics computed", body = CaseDelta),
        (status = 400, description = "Date range is reversed", body = ErrorResponse),
        (status = 404, description = "No country selected", body = ErrorResponse),
        (status = 422, description = "Range incomplete or no data", body = ErrorResponse),
        (status = 502, description = "Statistics API failed", body = ErrorResponse)
    )
)]
pub async fn fetch_statistics(State(state): State<AppState>) -> ApiResult<Json<CaseDelta>> {
    Ok(Json(state.session().fetch_statistics().await?))
}
