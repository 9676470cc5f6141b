//! Country and date range selection endpoints.

use axum::extract::State;
use axum::routing::put;
use axum::{Json, Router};
use chrono::NaiveDate;
use exposure_core::{
    date_from_picker, parse_api_date, Country, CountrySelector, DatePoint, SessionSnapshot,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::AppState;

/// Creates the selection router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/country", put(select_country))
        .route("/range", put(set_date_bound))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A date given either as text or as date picker fields.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum DateInput {
    /// `YYYY-MM-DD` text.
    Text {
        /// The date, e.g. `2021-03-01`.
        date: String,
    },
    /// Date picker fields with a zero-based month.
    Picker {
        /// Calendar year.
        year: i32,
        /// Month, 0 for January.
        month: u32,
        /// Day of month.
        day: u32,
    },
}

impl DateInput {
    fn resolve(&self) -> ApiResult<NaiveDate> {
        match self {
            Self::Text { date } => Ok(parse_api_date(date)?),
            Self::Picker { year, month, day } => date_from_picker(*year, *month, *day)
                .ok_or_else(|| {
                    ApiError::bad_request(
                        "INVALID_DATE",
                        format!("No such date: year {year}, month {month} (0-based), day {day}"),
                    )
                }),
        }
    }
}

/// Set one end of the date range.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "point": "start", "date": "2021-03-01" }))]
pub struct SetDateBoundRequest {
    /// Which end of the range to set.
    pub point: DatePoint,

    /// The new date.
    #[serde(flatten)]
    pub value: DateInput,
}

/// The current selection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "selected_country": { "name": "Israel", "slug": "israel", "iso2": "IL" },
    "selected_index": 1,
    "from_date": "2021-03-01",
    "to_date": "2021-03-05",
    "range_valid": true
}))]
pub struct SelectionResponse {
    /// Selected country.
    pub selected_country: Option<Country>,

    /// Position of the selected country in the country list.
    pub selected_index: Option<usize>,

    /// Start of the range.
    #[schema(value_type = Option<String>, format = Date)]
    pub from_date: Option<NaiveDate>,

    /// End of the range.
    #[schema(value_type = Option<String>, format = Date)]
    pub to_date: Option<NaiveDate>,

    /// Whether the range is chronological; absent until both ends are set.
    pub range_valid: Option<bool>,
}

impl From<SessionSnapshot> for SelectionResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        let range_valid = snapshot.date_range().map(|range| range.is_valid());
        Self {
            selected_country: snapshot.selected_country,
            selected_index: snapshot.selected_index,
            from_date: snapshot.from_date,
            to_date: snapshot.to_date,
            range_valid,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Select a country by list index or ISO code.
#[utoipa::path(
    put,
    path = "/api/selection/country",
    tag = "selection",
    operation_id = "selectCountry",
    summary = "Select a country",
    description = "Selects a country by its position in the sorted list \
        (`{\"index\": 3}`) or by ISO 3166-1 alpha-2 code (`{\"code\": \"IL\"}`). \
        An unknown index or code leaves the selection unchanged.",
    request_body = CountrySelector,
    responses(
        (status = 200, description = "Country selected", body = SelectionResponse),
        (status = 404, description = "No such country", body = ErrorResponse)
    )
)]
pub async fn select_country(
    State(state): State<AppState>,
    Json(selector): Json<CountrySelector>,
) -> ApiResult<Json<SelectionResponse>> {
    state.session().select_country(&selector)?;
    Ok(Json(state.session().snapshot().into()))
}

/// Set the start or end of the date range.
#[utoipa::path(
    put,
    path = "/api/selection/range",
    tag = "selection",
    operation_id = "setDateBound",
    summary = "Set a date range bound",
    description = "Sets the start or end date. Dates are accepted as \
        `YYYY-MM-DD` text or as date picker fields with a zero-based month. \
        The range is validated when statistics are fetched.",
    request_body = SetDateBoundRequest,
    responses(
        (status = 200, description = "Bound set", body = SelectionResponse),
        (status = 400, description = "Invalid date", body = ErrorResponse)
    )
)]
pub async fn set_date_bound(
    State(state): State<AppState>,
    Json(request): Json<SetDateBoundRequest>,
) -> ApiResult<Json<SelectionResponse>> {
    let date = request.value.resolve()?;
    state.session().set_date_range_bound(request.point, date);
    Ok(Json(state.session().snapshot().into()))
}
