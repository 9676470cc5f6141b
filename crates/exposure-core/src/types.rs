//! Shared data model.
//!
//! These are the values exchanged between the statistics client, the
//! aggregator, the proximity scanner and the session controller. All of them
//! serialize to JSON and carry OpenAPI schemas so the server can expose them
//! unchanged.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A country known to the statistics API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Country {
    /// Display name.
    #[schema(example = "Israel")]
    pub name: String,

    /// Identifier used in API paths.
    #[schema(example = "israel")]
    pub slug: String,

    /// ISO 3166-1 alpha-2 code.
    #[schema(example = "IL")]
    pub iso2: String,
}

/// Sort countries ascending by name.
///
/// The published country list is always in this order regardless of the
/// order the API returned them in.
pub fn sort_countries(countries: &mut [Country]) {
    countries.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Cumulative case counters for one country on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyCasePoint {
    /// Calendar day of the sample.
    #[schema(value_type = String, format = Date, example = "2021-03-01")]
    pub date: NaiveDate,

    /// Total confirmed cases up to and including this day.
    #[schema(example = 799_610)]
    pub confirmed: i64,

    /// Total deaths up to and including this day.
    #[schema(example = 5_867)]
    pub deaths: i64,

    /// Total recoveries up to and including this day.
    #[schema(example = 753_114)]
    pub recovered: i64,
}

/// Change of the cumulative counters over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "country": "Israel",
    "confirmed": 15,
    "deaths": 0,
    "recovered": 4
}))]
pub struct CaseDelta {
    /// Country name the delta was computed for.
    pub country: String,

    /// New confirmed cases in the range.
    pub confirmed: i64,

    /// New deaths in the range.
    pub deaths: i64,

    /// New recoveries in the range.
    pub recovered: i64,
}

/// Which end of the date range a selected date applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatePoint {
    /// The first day of the range.
    Start,
    /// The last day of the range.
    End,
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    /// First day.
    #[schema(value_type = String, format = Date, example = "2021-03-01")]
    pub from: NaiveDate,

    /// Last day.
    #[schema(value_type = String, format = Date, example = "2021-03-31")]
    pub to: NaiveDate,
}

impl DateRange {
    /// Create a range without validating it.
    #[must_use]
    pub const fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// A range is valid when it does not end before it starts.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.from <= self.to
    }
}

/// State of a proximity scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanState {
    /// No scan has run yet.
    #[default]
    Idle,
    /// The radio is scanning.
    Scanning,
    /// The target advertised before the deadline.
    Found,
    /// The deadline passed, or the scan was stopped, without a match.
    NotFound,
    /// The adapter reported an error.
    Failed {
        /// Adapter error code.
        code: i32,
    },
}

impl ScanState {
    /// Whether no further transition happens without a new scan.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Found | Self::NotFound | Self::Failed { .. })
    }
}

/// One scan for a target address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "018f3c5e-7b1a-7c2d-9e4f-0a1b2c3d4e5f",
    "target_address": "64:E8:CE:FF:34:4E",
    "duration_ms": 5000,
    "state": { "status": "found" },
    "started_at_utc": "2021-03-01T12:00:00Z",
    "resolved_at_utc": "2021-03-01T12:00:02Z",
    "rssi_dbm": -67
}))]
pub struct ScanSession {
    /// Unique session identifier.
    pub id: Option<Uuid>,

    /// Address being scanned for.
    pub target_address: String,

    /// Scan window in milliseconds.
    pub duration_ms: u64,

    /// Current state.
    pub state: ScanState,

    /// When the scan started.
    pub started_at_utc: Option<DateTime<Utc>>,

    /// When the scan reached its terminal state.
    pub resolved_at_utc: Option<DateTime<Utc>>,

    /// Signal strength of the matching advertisement, if any.
    pub rssi_dbm: Option<i16>,
}

impl ScanSession {
    /// The session before any scan has been requested.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            id: None,
            target_address: String::new(),
            duration_ms: 0,
            state: ScanState::Idle,
            started_at_utc: None,
            resolved_at_utc: None,
            rssi_dbm: None,
        }
    }

    pub(crate) fn begin(target_address: String, duration: Duration) -> Self {
        Self {
            id: Some(Uuid::now_v7()),
            target_address,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            state: ScanState::Scanning,
            started_at_utc: Some(Utc::now()),
            resolved_at_utc: None,
            rssi_dbm: None,
        }
    }

    /// Whether the radio is currently scanning for this session.
    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn country(name: &str) -> Country {
        Country {
            name: name.to_string(),
            slug: name.to_lowercase(),
            iso2: name[..2].to_uppercase(),
        }
    }

    #[test]
    fn test_sort_countries_by_name() {
        let mut countries = vec![country("Zambia"), country("Israel"), country("Albania")];
        sort_countries(&mut countries);
        let names: Vec<&str> = countries.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Albania", "Israel", "Zambia"]);
    }

    #[test]
    fn test_date_range_validity() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

        assert!(DateRange::new(d("2021-03-01"), d("2021-03-31")).is_valid());
        assert!(DateRange::new(d("2021-03-01"), d("2021-03-01")).is_valid());
        assert!(!DateRange::new(d("2021-03-02"), d("2021-03-01")).is_valid());
    }

    #[test]
    fn test_scan_state_terminal() {
        assert!(!ScanState::Idle.is_terminal());
        assert!(!ScanState::Scanning.is_terminal());
        assert!(ScanState::Found.is_terminal());
        assert!(ScanState::NotFound.is_terminal());
        assert!(ScanState::Failed { code: 3 }.is_terminal());
    }

    #[test]
    fn test_scan_state_serialization() {
        let json = serde_json::to_string(&ScanState::Failed { code: 2 }).unwrap();
        assert_eq!(json, r#"{"status":"failed","code":2}"#);

        let json = serde_json::to_string(&ScanState::NotFound).unwrap();
        assert_eq!(json, r#"{"status":"not_found"}"#);
    }

    #[test]
    fn test_scan_session_begin() {
        let session = ScanSession::begin("64:E8:CE:FF:34:4E".into(), Duration::from_secs(5));
        assert!(session.is_scanning());
        assert_eq!(session.duration_ms, 5000);
        assert!(session.id.is_some());
        assert!(session.resolved_at_utc.is_none());
    }
}
