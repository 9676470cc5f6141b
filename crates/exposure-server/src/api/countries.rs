//! Country list endpoints.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use exposure_core::Country;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::AppState;

/// Creates the countries router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_countries))
        .route("/refresh", post(refresh_countries))
}

/// Country list with the current selection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "countries": [
        { "name": "Albania", "slug": "albania", "iso2": "AL" },
        { "name": "Israel", "slug": "israel", "iso2": "IL" }
    ],
    "selected_index": 0
}))]
pub struct CountriesResponse {
    /// Countries sorted by name.
    pub countries: Vec<Country>,

    /// Position of the selected country, if any.
    #[schema(example = 0)]
    pub selected_index: Option<usize>,
}

/// List the countries loaded so far.
#[utoipa::path(
    get,
    path = "/api/countries",
    tag = "countries",
    operation_id = "listCountries",
    summary = "List loaded countries",
    description = "Returns the country list from the last successful refresh. \
        The list is empty until `POST /api/countries/refresh` succeeds.",
    responses(
        (status = 200, description = "Current country list", body = CountriesResponse)
    )
)]
pub async fn list_countries(State(state): State<AppState>) -> Json<CountriesResponse> {
    let snapshot = state.session().snapshot();
    Json(CountriesResponse {
        countries: snapshot.countries,
        selected_index: snapshot.selected_index,
    })
}

/// Reload the country list from the statistics API.
#[utoipa::path(
    post,
    path = "/api/countries/refresh",
    tag = "countries",
    operation_id = "refreshCountries",
    summary = "Reload countries",
    description = "Fetches the country list from the statistics API, sorts it \
        by name and selects the first entry.",
    responses(
        (status = 200, description = "Countries reloaded", body = CountriesResponse),
        (status = 502, description = "Statistics API failed", body = ErrorResponse)
    )
)]
pub async fn refresh_countries(
    State(state): State<AppState>,
) -> ApiResult<Json<CountriesResponse>> {
    let countries = state.session().fetch_countries().await?;
    let selected_index = state.session().snapshot().selected_index;

    Ok(Json(CountriesResponse {
        countries,
        selected_index,
    }))
}
