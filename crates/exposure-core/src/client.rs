//! HTTP client for the COVID-19 time-series API.
//!
//! Two calls are used:
//!
//! - `GET {base}/countries` - every country the API knows about
//! - `GET {base}/country/{slug}?from=YYYY-MM-DD&to=YYYY-MM-DD` - one cumulative
//!   sample per day for a country
//!
//! The session controller talks to the API through the [`TimeSeriesSource`]
//! trait so another backend (or a test double) can be swapped in.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::dates::{format_api_date, parse_api_date};
use crate::error::Result;
use crate::types::{Country, DailyCasePoint};

/// Failures talking to the statistics API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured base URL cannot be used.
    #[error("Invalid API base URL '{url}': {message}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request never produced a response.
    #[error("Request to {url} failed: {source}")]
    Request {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body was not what the API documents.
    #[error("Malformed response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Parser message.
        message: String,
    },
}

/// Source of country lists and daily case series.
#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    /// Fetch every available country, in the order the source returns them.
    async fn list_countries(&self) -> Result<Vec<Country>>;

    /// Fetch the daily samples for `slug` between `from` and `to`, ascending by date.
    async fn daily_series(
        &self,
        slug: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyCasePoint>>;
}

#[derive(Debug, Deserialize)]
struct CountryRecord {
    #[serde(rename = "Country", alias = "name")]
    name: String,
    #[serde(rename = "Slug", alias = "slug")]
    slug: String,
    #[serde(rename = "ISO2", alias = "iso2")]
    iso2: String,
}

impl From<CountryRecord> for Country {
    fn from(record: CountryRecord) -> Self {
        Self {
            name: record.name,
            slug: record.slug,
            iso2: record.iso2,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DayRecord {
    #[serde(rename = "Date", alias = "date")]
    date: String,
    #[serde(rename = "Confirmed", alias = "confirmed")]
    confirmed: i64,
    #[serde(rename = "Deaths", alias = "deaths")]
    deaths: i64,
    #[serde(rename = "Recovered", alias = "recovered")]
    recovered: i64,
}

impl DayRecord {
    /// Keeps only the calendar day of `2021-03-01` or `2021-03-01T00:00:00Z`.
    fn into_point(self) -> Option<DailyCasePoint> {
        let day = self.date.get(..10).unwrap_or(&self.date);
        let date = parse_api_date(day).ok()?;
        Some(DailyCasePoint {
            date,
            confirmed: self.confirmed,
            deaths: self.deaths,
            recovered: self.recovered,
        })
    }
}

/// `reqwest`-backed client for the statistics API.
#[derive(Debug, Clone)]
pub struct TimeSeriesClient {
    client: reqwest::Client,
    base_url: Url,
}

impl TimeSeriesClient {
    /// Create a client for `base_url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or is not an HTTP(S) URL,
    /// or if the TLS backend fails to initialize.
    pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("exposure/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Build)?;
        Self::with_client(client, base_url)
    }

    /// Create a client around an existing `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or cannot carry a path.
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
    ) -> std::result::Result<Self, ClientError> {
        let mut url = Url::parse(base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url.to_string(),
                message: "expected an http or https URL".to_string(),
            });
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            client,
            base_url: url,
        })
    }

    /// The normalized base URL (always ends with `/`).
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Base URLs are validated in `with_client`, so segments are always available.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> std::result::Result<T, ClientError> {
        debug!(url = %url, "Requesting statistics API");

        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Request {
                url: url.to_string(),
                source,
            })?;

        serde_json::from_str(&body).map_err(|e| ClientError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl TimeSeriesSource for TimeSeriesClient {
    async fn list_countries(&self) -> Result<Vec<Country>> {
        let url = self.endpoint(&["countries"]);
        let records: Vec<CountryRecord> = self.get_json(url, &[]).await?;
        debug!(count = records.len(), "Fetched countries");
        Ok(records.into_iter().map(Country::from).collect())
    }

    async fn daily_series(
        &self,
        slug: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyCasePoint>> {
        let url = self.endpoint(&["country", slug]);
        let query = [("from", format_api_date(from)), ("to", format_api_date(to))];
        let records: Vec<DayRecord> = self.get_json(url.clone(), &query).await?;

        let total = records.len();
        let mut points = Vec::with_capacity(total);
        for record in records {
            let raw_date = record.date.clone();
            match record.into_point() {
                Some(point) => points.push(point),
                None => {
                    warn!(slug, date = %raw_date, "Unparseable date in daily series");
                    return Err(ClientError::Decode {
                        url: url.to_string(),
                        message: format!("invalid date '{raw_date}'"),
                    }
                    .into());
                }
            }
        }
        points.sort_by_key(|p| p.date);

        debug!(slug, points = points.len(), "Fetched daily series");
        Ok(points)
    }
}
