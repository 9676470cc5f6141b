//! Date helpers for the `YYYY-MM-DD` format the statistics API speaks.

use chrono::NaiveDate;

use crate::error::{ExposureError, Result};

/// Date format exchanged with the statistics API.
pub const API_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a date as `YYYY-MM-DD`.
#[must_use]
pub fn format_api_date(date: NaiveDate) -> String {
    date.format(API_DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`ExposureError::InvalidDate`] if the string is not a valid
/// zero-padded calendar date.
pub fn parse_api_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), API_DATE_FORMAT)
        .map_err(|_| ExposureError::InvalidDate(value.to_string()))
}

/// Whether `to` falls on or after `from`.
///
/// Unparseable input on either side yields `false`.
#[must_use]
pub fn are_dates_chronological(from: &str, to: &str) -> bool {
    match (parse_api_date(from), parse_api_date(to)) {
        (Ok(from), Ok(to)) => to >= from,
        _ => false,
    }
}

/// Build a date from a calendar picker's year, zero-based month and day.
///
/// Returns `None` for impossible dates such as February 30th.
#[must_use]
pub fn date_from_picker(year: i32, month0: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month0.checked_add(1)?, day)
}
