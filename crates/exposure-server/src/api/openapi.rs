//! OpenAPI specification generation for the exposure API.

use axum::Json;
use exposure_core::{
    CaseDelta, Country, CountrySelector, DatePoint, DateRange, ScanSession, ScanState,
    SessionSnapshot,
};
use utoipa::OpenApi;

use super::config::ConfigResponse;
use super::countries::CountriesResponse;
use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::scan::StopScanResponse;
use super::selection::{DateInput, SelectionResponse, SetDateBoundRequest};
use super::statistics::StatisticsResponse;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for exposure.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "exposure API",
        version = "0.1.0",
        description = r#"
# exposure API

exposure combines two things:

1. **Case statistics**: pick a country and a date range, and get the change in
   confirmed cases, deaths and recoveries between the first and last day.
2. **Proximity scanning**: run a time-boxed Bluetooth LE scan for one configured
   device address and learn whether it was seen.

All state lives in a single session. `GET /api/session` returns the whole
snapshot, including the loading flag and the last error message.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local exposure server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "session", description = "Session snapshot and error state"),
        (name = "countries", description = "Country list from the statistics API"),
        (name = "selection", description = "Country and date range selection"),
        (name = "statistics", description = "Case changes over the selected range"),
        (name = "scan", description = "Bluetooth LE proximity scanning"),
        (name = "config", description = "Active configuration")
    ),
    paths(
        super::health::health_check,
        super::session::get_session,
        super::session::clear_error,
        super::countries::list_countries,
        super::countries::refresh_countries,
        super::selection::select_country,
        super::selection::set_date_bound,
        super::statistics::get_statistics,
        super::statistics::fetch_statistics,
        super::scan::get_scan,
        super::scan::start_scan,
        super::scan::stop_scan,
        super::config::get_config,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            ConfigResponse,
            // Core types
            Country,
            CaseDelta,
            CountrySelector,
            DatePoint,
            DateRange,
            ScanState,
            ScanSession,
            SessionSnapshot,
            // Request/response types
            CountriesResponse,
            DateInput,
            SetDateBoundRequest,
            SelectionResponse,
            StatisticsResponse,
            StopScanResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "exposure API");
        assert!(spec.paths.paths.contains_key("/api/scan"));
        assert!(spec.paths.paths.contains_key("/api/statistics"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"exposure API\""));
        assert!(json.contains("SessionSnapshot"));
    }

    #[test]
    fn test_start_scan_documents_adapter_failure_as_success_body() {
        let spec = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let responses = spec
            .pointer("/paths/~1api~1scan/post/responses")
            .and_then(|r| r.as_object())
            .unwrap();

        let mut codes: Vec<&str> = responses.keys().map(String::as_str).collect();
        codes.sort_unstable();
        assert_eq!(codes, ["200", "409", "422", "503"]);
        assert!(responses["503"]["description"]
            .as_str()
            .unwrap()
            .contains("scan task"));
    }
}
