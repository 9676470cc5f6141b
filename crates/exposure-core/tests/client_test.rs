#![allow(clippy::unwrap_used)]
// Integration tests for `TimeSeriesClient` using wiremock.

use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use exposure_core::{ExposureError, TimeSeriesClient, TimeSeriesSource};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, TimeSeriesClient) {
    let server = MockServer::start().await;
    let client = TimeSeriesClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    (server, client)
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
}

// ── Country list ────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_countries() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "Country": "Israel", "Slug": "israel", "ISO2": "IL" },
            { "Country": "Albania", "Slug": "albania", "ISO2": "AL" }
        ])))
        .mount(&server)
        .await;

    let countries = client.list_countries().await.unwrap();

    assert_eq!(countries.len(), 2);
    assert_eq!(countries[0].name, "Israel");
    assert_eq!(countries[0].slug, "israel");
    assert_eq!(countries[1].iso2, "AL");
}

#[tokio::test]
async fn test_list_countries_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let result = client.list_countries().await;

    assert!(
        matches!(result, Err(ExposureError::Network(ref msg)) if msg.contains("503")),
        "expected Network error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_list_countries_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .mount(&server)
        .await;

    let result = client.list_countries().await;
    assert!(matches!(result, Err(ExposureError::Network(_))));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = TimeSeriesClient::new(&uri, Duration::from_secs(1)).unwrap();
    let result = client.list_countries().await;

    assert!(matches!(result, Err(ExposureError::Network(_))));
}

// ── Daily series ────────────────────────────────────────────────────

#[tokio::test]
async fn test_daily_series_sends_range_and_sorts() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/country/israel"))
        .and(query_param("from", "2021-03-01"))
        .and(query_param("to", "2021-03-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "Country": "Israel", "Confirmed": 30, "Deaths": 3, "Recovered": 9, "Date": "2021-03-03T00:00:00Z" },
            { "Country": "Israel", "Confirmed": 10, "Deaths": 1, "Recovered": 2, "Date": "2021-03-01T00:00:00Z" },
            { "Country": "Israel", "Confirmed": 20, "Deaths": 2, "Recovered": 5, "Date": "2021-03-02T00:00:00Z" }
        ])))
        .mount(&server)
        .await;

    let series = client.daily_series("israel", date(1), date(3)).await.unwrap();

    let dates: Vec<NaiveDate> = series.iter().map(|p| p.date).collect();
    assert_eq!(dates, [date(1), date(2), date(3)]);
    assert_eq!(series[0].confirmed, 10);
    assert_eq!(series[2].recovered, 9);
}

#[tokio::test]
async fn test_daily_series_feeds_aggregate() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/country/israel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "date": "2021-03-01", "confirmed": 10, "deaths": 0, "recovered": 1 },
            { "date": "2021-03-02", "confirmed": 25, "deaths": 1, "recovered": 3 }
        ])))
        .mount(&server)
        .await;

    let series = client.daily_series("israel", date(1), date(2)).await.unwrap();
    let delta = exposure_core::aggregate("Israel", &series).unwrap();

    assert_eq!(delta.confirmed, 15);
    assert_eq!(delta.deaths, 1);
    assert_eq!(delta.recovered, 2);
}

#[tokio::test]
async fn test_daily_series_empty_is_ok() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/country/atlantis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let series = client.daily_series("atlantis", date(1), date(2)).await.unwrap();
    assert!(series.is_empty());
}

#[tokio::test]
async fn test_daily_series_bad_date_is_network_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/country/israel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "Confirmed": 10, "Deaths": 0, "Recovered": 1, "Date": "yesterday" }
        ])))
        .mount(&server)
        .await;

    let result = client.daily_series("israel", date(1), date(2)).await;

    assert!(
        matches!(result, Err(ExposureError::Network(ref msg)) if msg.contains("yesterday")),
        "expected Network error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_daily_series_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/country/nowhere"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = client.daily_series("nowhere", date(1), date(2)).await;
    assert!(matches!(result, Err(ExposureError::Network(_))));
}
