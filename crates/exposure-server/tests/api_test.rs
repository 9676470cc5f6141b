#![allow(clippy::unwrap_used)]
// End-to-end API tests: axum-test drives the router, wiremock stands in for
// the statistics API and MockRadio for the Bluetooth adapter.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use exposure_core::{BluetoothError, Config, MockRadio, TimeSeriesClient};
use exposure_server::api::create_router;
use exposure_server::state::AppState;

const TARGET: &str = "64:E8:CE:FF:34:4E";

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    server: TestServer,
    upstream: MockServer,
    radio: Arc<MockRadio>,
}

async fn harness_with_radio(radio: MockRadio) -> Harness {
    let upstream = MockServer::start().await;

    let mut config = Config::default();
    config.api.base_url = upstream.uri();
    config.scan.target_address = TARGET.to_string();
    config.scan.duration_ms = 200;

    let client = TimeSeriesClient::new(&upstream.uri(), Duration::from_secs(5)).unwrap();
    let radio = Arc::new(radio);
    let state = AppState::with_parts(config, Arc::new(client), radio.clone(), true);

    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        upstream,
        radio,
    }
}

async fn harness() -> Harness {
    harness_with_radio(MockRadio::new()).await
}

async fn mount_countries(upstream: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "Country": "Israel", "Slug": "israel", "ISO2": "IL" },
            { "Country": "Albania", "Slug": "albania", "ISO2": "AL" },
            { "Country": "Germany", "Slug": "germany", "ISO2": "DE" }
        ])))
        .mount(upstream)
        .await;
}

async fn load_and_select_israel(h: &Harness) {
    mount_countries(&h.upstream).await;
    h.server.post("/api/countries/refresh").await.assert_status_ok();
    h.server
        .put("/api/selection/country")
        .json(&json!({ "code": "il" }))
        .await
        .assert_status_ok();
}

async fn set_range(h: &Harness, from: &str, to: &str) {
    h.server
        .put("/api/selection/range")
        .json(&json!({ "point": "start", "date": from }))
        .await
        .assert_status_ok();
    h.server
        .put("/api/selection/range")
        .json(&json!({ "point": "end", "date": to }))
        .await
        .assert_status_ok();
}

// ── System ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let h = harness().await;

    let response = h.server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["bluetooth_available"], true);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let h = harness().await;

    let response = h.server.get("/api/openapi.json").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["info"]["title"], "exposure API");
    assert!(body["paths"]["/api/scan"].is_object());
}

#[tokio::test]
async fn test_config_reports_scan_settings() {
    let h = harness().await;

    let body: Value = h.server.get("/api/config").await.json();
    assert_eq!(body["target_address"], TARGET);
    assert_eq!(body["scan_duration_ms"], 200);
}

#[tokio::test]
async fn test_initial_session_is_idle() {
    let h = harness().await;

    let body: Value = h.server.get("/api/session").await.json();
    assert_eq!(body["is_loading"], false);
    assert_eq!(body["error_message"], Value::Null);
    assert_eq!(body["countries"], json!([]));
    assert_eq!(body["scan"]["state"]["status"], "idle");
}

// ── Countries ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_sorts_and_selects_first() {
    let h = harness().await;
    mount_countries(&h.upstream).await;

    let response = h.server.post("/api/countries/refresh").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let names: Vec<&str> = body["countries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Albania", "Germany", "Israel"]);
    assert_eq!(body["selected_index"], 0);

    let session: Value = h.server.get("/api/session").await.json();
    assert_eq!(session["selected_country"]["iso2"], "AL");
    assert_eq!(session["is_loading"], false);
}

#[tokio::test]
async fn test_refresh_failure_publishes_error_until_cleared() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.upstream)
        .await;

    let response = h.server.post("/api/countries/refresh").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"], "NETWORK_ERROR");

    let session: Value = h.server.get("/api/session").await.json();
    assert!(session["error_message"].as_str().unwrap().contains("500"));
    assert_eq!(session["is_loading"], false);

    h.server
        .delete("/api/session/error")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let session: Value = h.server.get("/api/session").await.json();
    assert_eq!(session["error_message"], Value::Null);
}

// ── Selection ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_select_by_index_and_code() {
    let h = harness().await;
    mount_countries(&h.upstream).await;
    h.server.post("/api/countries/refresh").await.assert_status_ok();

    let body: Value = h
        .server
        .put("/api/selection/country")
        .json(&json!({ "index": 1 }))
        .await
        .json();
    assert_eq!(body["selected_country"]["name"], "Germany");

    let body: Value = h
        .server
        .put("/api/selection/country")
        .json(&json!({ "code": "IL" }))
        .await
        .json();
    assert_eq!(body["selected_country"]["name"], "Israel");
    assert_eq!(body["selected_index"], 2);
}

#[tokio::test]
async fn test_unknown_selection_keeps_current_country() {
    let h = harness().await;
    mount_countries(&h.upstream).await;
    h.server.post("/api/countries/refresh").await.assert_status_ok();

    let response = h
        .server
        .put("/api/selection/country")
        .json(&json!({ "index": 42 }))
        .await;
    response.assert_status_not_found();

    let session: Value = h.server.get("/api/session").await.json();
    assert_eq!(session["selected_country"]["name"], "Albania");
    assert_eq!(session["error_message"], Value::Null);
}

#[tokio::test]
async fn test_range_accepts_text_and_picker_dates() {
    let h = harness().await;

    h.server
        .put("/api/selection/range")
        .json(&json!({ "point": "start", "date": "2021-03-01" }))
        .await
        .assert_status_ok();

    let body: Value = h
        .server
        .put("/api/selection/range")
        .json(&json!({ "point": "end", "year": 2021, "month": 2, "day": 5 }))
        .await
        .json();
    assert_eq!(body["from_date"], "2021-03-01");
    assert_eq!(body["to_date"], "2021-03-05");
    assert_eq!(body["range_valid"], true);
}

#[tokio::test]
async fn test_range_rejects_malformed_date() {
    let h = harness().await;

    let response = h
        .server
        .put("/api/selection/range")
        .json(&json!({ "point": "start", "date": "01.03.2021" }))
        .await;
    response.assert_status_bad_request();

    let body: Value = response.json();
    assert_eq!(body["error"], "INVALID_DATE");
}

// ── Statistics ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_statistics_for_selection() {
    let h = harness().await;
    load_and_select_israel(&h).await;
    set_range(&h, "2021-03-01", "2021-03-03").await;

    Mock::given(method("GET"))
        .and(path("/country/israel"))
        .and(query_param("from", "2021-03-01"))
        .and(query_param("to", "2021-03-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "Country": "Israel", "Confirmed": 10, "Deaths": 1, "Recovered": 2, "Date": "2021-03-01T00:00:00Z" },
            { "Country": "Israel", "Confirmed": 18, "Deaths": 1, "Recovered": 4, "Date": "2021-03-02T00:00:00Z" },
            { "Country": "Israel", "Confirmed": 25, "Deaths": 2, "Recovered": 6, "Date": "2021-03-03T00:00:00Z" }
        ])))
        .mount(&h.upstream)
        .await;

    let response = h.server.post("/api/statistics").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        body,
        json!({ "country": "Israel", "confirmed": 15, "deaths": 1, "recovered": 4 })
    );

    let body: Value = h.server.get("/api/statistics").await.json();
    assert_eq!(body["case_delta"]["confirmed"], 15);
    assert_eq!(body["range"]["from"], "2021-03-01");
}

#[tokio::test]
async fn test_statistics_reversed_range_is_rejected() {
    let h = harness().await;
    load_and_select_israel(&h).await;
    set_range(&h, "2021-03-05", "2021-03-01").await;

    let response = h.server.post("/api/statistics").await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "INVALID_DATE_RANGE");

    let session: Value = h.server.get("/api/session").await.json();
    assert!(session["error_message"].is_string());
    assert_eq!(session["case_delta"], Value::Null);
}

#[tokio::test]
async fn test_statistics_incomplete_range() {
    let h = harness().await;
    load_and_select_israel(&h).await;

    let response = h.server.post("/api/statistics").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"], "INCOMPLETE_DATE_RANGE");
}

#[tokio::test]
async fn test_statistics_empty_series() {
    let h = harness().await;
    load_and_select_israel(&h).await;
    set_range(&h, "2021-03-01", "2021-03-02").await;

    Mock::given(method("GET"))
        .and(path("/country/israel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.upstream)
        .await;

    let response = h.server.post("/api/statistics").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"], "INSUFFICIENT_DATA");
}

// ── Scan ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scan_finds_target() {
    let h = harness_with_radio(MockRadio::new().with_device("64:e8:ce:ff:34:4e", Some(-61))).await;

    let response = h.server.post("/api/scan").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["state"]["status"], "found");
    assert_eq!(body["target_address"], TARGET);
    assert_eq!(body["rssi_dbm"], -61);
    assert!(body["id"].is_string());
    assert_eq!(h.radio.stop_count(), 1);
}

#[tokio::test]
async fn test_scan_times_out_as_not_found() {
    let h = harness_with_radio(MockRadio::new().with_device("AA:BB:CC:DD:EE:FF", Some(-40))).await;

    let body: Value = h.server.post("/api/scan").await.json();
    assert_eq!(body["state"]["status"], "not_found");
    assert!(body["resolved_at_utc"].is_string());
}

#[tokio::test]
async fn test_scan_adapter_failure_is_reported() {
    let h = harness().await;
    h.radio.fail_next_start(BluetoothError::AdapterNotFound);

    let response = h.server.post("/api/scan").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["state"], json!({ "status": "failed", "code": 5 }));

    let session: Value = h.server.get("/api/session").await.json();
    assert_eq!(
        session["error_message"],
        "Bluetooth scan failed with code 5"
    );
}

#[tokio::test]
async fn test_stop_without_running_scan() {
    let h = harness().await;

    let body: Value = h.server.delete("/api/scan").await.json();
    assert_eq!(body["stopped"], false);
    assert_eq!(body["session"]["state"]["status"], "idle");
}

#[tokio::test]
async fn test_scan_session_is_readable_after_scan() {
    let h = harness_with_radio(MockRadio::new().with_device(TARGET, None)).await;
    h.server.post("/api/scan").await.assert_status_ok();

    let body: Value = h.server.get("/api/scan").await.json();
    assert_eq!(body["state"]["status"], "found");
    assert_eq!(body["duration_ms"], 200);
    assert_eq!(h.radio.start_count(), 1);
}
